//! Plain text rendering of deployment progress.

use comfy_table::{Table, presets::UTF8_FULL};
use tokenship_deploy::{DeployEvent, NetworkRegistry, Stage};
use tokio::sync::mpsc::UnboundedReceiver;

/// Print every event received on `events` until the sender side is dropped.
pub async fn print_events(mut events: UnboundedReceiver<DeployEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

/// The line printed for an event, if it is worth printing.
pub fn describe(event: &DeployEvent) -> Option<String> {
    let line = match event {
        DeployEvent::StageStarted(Stage::Compiling) => "Compiling...".to_string(),
        DeployEvent::StageStarted(Stage::Verifying) => "Verifying...".to_string(),
        DeployEvent::StageStarted(_) => return None,
        DeployEvent::Compiled {
            contract,
            bytecode_len,
        } => format!("Compiled {contract} ({bytecode_len} bytes)"),
        DeployEvent::Submitted { tx_hash, from, .. } => {
            format!("Deployment transaction {tx_hash} sent from {from}")
        }
        DeployEvent::Included { address, block, .. } => {
            format!("Token deployed successfully. Address: {address} (block {block})")
        }
        DeployEvent::Reorged {
            previous_block,
            block,
        } => format!("Chain re-organized: transaction moved from block {previous_block} to {block}"),
        DeployEvent::ConfirmationProgress { observed: 0, required } => {
            format!("Waiting for {required} confirmations")
        }
        DeployEvent::ConfirmationProgress { observed, required } => {
            format!("  {observed}/{required} confirmations")
        }
        DeployEvent::Confirmed { .. } => "Confirmed".to_string(),
        DeployEvent::Verified { .. } => "VERIFICATION COMPLETE!".to_string(),
        DeployEvent::VerificationFailed { reason, .. } => format!("Verification failed: {reason}"),
        DeployEvent::VerificationSkipped { reason } => format!("Verification skipped: {reason}"),
    };
    Some(line)
}

/// A table of the registry's networks and what each can be used for.
pub fn networks_table(registry: &NetworkRegistry, default_network: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Network",
        "Chain ID",
        "RPC URL",
        "Can deploy",
        "Can verify",
    ]);

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    for profile in registry.profiles() {
        let name = if profile.name == default_network {
            format!("{} (default)", profile.name)
        } else {
            profile.name.clone()
        };
        table.add_row(vec![
            name,
            profile
                .chain_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string()),
            profile.rpc_url.to_string(),
            yes_no(profile.can_submit()).to_string(),
            yes_no(profile.verification_explorer().is_some()).to_string(),
        ]);
    }
    table
}

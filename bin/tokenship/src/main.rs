//! tokenship deploys a Token contract to an EVM network and verifies its source.

mod cli;
mod config;
mod render;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use tokenship_deploy::{
    DeployEvent, DeployOptions, DeploymentRequest, DeploymentStore, HttpConnector,
    NetworkRegistry, Orchestrator, ProjectConfig, SolcCompiler, generate_wallet,
};
use tokio::sync::mpsc;

use cli::{Cli, Command, DeployArgs, VerifyArgs};

/// Everything a command needs besides its own arguments.
struct App {
    config: ProjectConfig,
    config_path: PathBuf,
    network: String,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let config = config::load(&cli.config)?;
        let network = cli
            .network
            .clone()
            .unwrap_or_else(|| config.default_network.clone());
        Ok(Self {
            config,
            config_path: cli.config.clone(),
            network,
        })
    }

    /// The directory holding the configuration file; sources and records are relative to it.
    fn project_root(&self) -> &Path {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn registry(&self) -> Result<NetworkRegistry> {
        self.config.registry(|key| std::env::var(key).ok())
    }

    fn records(&self) -> DeploymentStore {
        DeploymentStore::new(self.project_root().join(&self.config.deploy.records_dir))
    }

    fn orchestrator(&self, options: DeployOptions) -> Orchestrator<SolcCompiler> {
        let compiler = SolcCompiler::new(self.project_root(), self.config.compiler.clone());
        Orchestrator::new(compiler, HttpConnector::new(self.config.verifier), options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match &cli.command {
        Command::GenerateWallet => generate_wallet_command(),
        Command::Networks => networks_command(&App::load(&cli)?),
        Command::Init { force } => init_command(&cli.config, *force),
        Command::Deploy(args) => deploy_command(&App::load(&cli)?, args.clone()).await,
        Command::Verify(args) => verify_command(&App::load(&cli)?, args).await,
    }
}

fn generate_wallet_command() -> Result<()> {
    let wallet = generate_wallet()?;
    println!("New wallet private key is {}", wallet.private_key.expose());
    println!("New wallet public address is {}", wallet.address);
    println!("New wallet mnemonic is \"{}\"", wallet.mnemonic.expose());
    Ok(())
}

fn networks_command(app: &App) -> Result<()> {
    let registry = app.registry()?;
    println!("{}", render::networks_table(&registry, &app.network));
    Ok(())
}

fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }
    ProjectConfig::default().save_to_file(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn deploy_command(app: &App, args: DeployArgs) -> Result<()> {
    let registry = app.registry()?;

    let mut options = app.config.deploy.options();
    if let Some(confirmations) = args.confirmations {
        options.confirmations = confirmations;
    }
    options.verify &= !args.no_verify;

    let mut orchestrator = app.orchestrator(options);
    if !args.no_record {
        orchestrator = orchestrator.with_records(app.records());
    }

    let request = DeploymentRequest::from(args.token);
    tracing::info!(
        network = %app.network,
        confirmations = orchestrator.options().confirmations,
        "Deploying"
    );

    let result = run_with_events(orchestrator, |orchestrator| async move {
        orchestrator
            .deploy_named(&registry, &app.network, &request)
            .await
    })
    .await?
    .with_context(|| format!("Deployment to `{}` failed", app.network))?;

    println!(
        "Deployed {} to {} at {} (tx {})",
        result.contract, result.network, result.address, result.tx_hash
    );
    Ok(())
}

async fn verify_command(app: &App, args: &VerifyArgs) -> Result<()> {
    let registry = app.registry()?;
    let network = registry.resolve(&app.network)?.clone();

    let constructor_args = match args.request()? {
        Some(request) => request.constructor_arguments(),
        None => {
            let record = app
                .records()
                .load(&app.network, &app.config.compiler.contract)
                .context("No constructor arguments given and no deployment record found")?;
            if record.address != args.address {
                tracing::warn!(
                    recorded = %record.address,
                    requested = %args.address,
                    "Using constructor arguments recorded for another address"
                );
            }
            record.constructor_args
        }
    };

    let address = args.address;
    let orchestrator = app.orchestrator(app.config.deploy.options());
    let outcome = run_with_events(orchestrator, |orchestrator| async move {
        orchestrator
            .verify(&network, address, &constructor_args)
            .await
    })
    .await??;

    println!("{address} {outcome} on {}", app.network);
    Ok(())
}

/// Run `f` on an orchestrator reporting to the console, until it completes or Ctrl+C is
/// pressed.
async fn run_with_events<T, F, Fut>(orchestrator: Orchestrator<SolcCompiler>, f: F) -> Result<T>
where
    F: FnOnce(Orchestrator<SolcCompiler>) -> Fut,
    Fut: Future<Output = T>,
{
    let (tx, rx) = mpsc::unbounded_channel::<DeployEvent>();
    let printer = tokio::spawn(render::print_events(rx));

    // The orchestrator owns the sender, so the printer stops once `f` is done with it.
    let outcome = tokio::select! {
        outcome = f(orchestrator.with_events(tx)) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    printer.await.context("Event printer panicked")?;
    outcome.ok_or_else(|| {
        anyhow::anyhow!(
            "Interrupted. A transaction already sent may still be mined; check the explorer"
        )
    })
}

//! End-to-end tests of the deployment pipeline against in-memory collaborators.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy_core::{
    primitives::{Address, B256, Bytes, address, keccak256},
    sol_types::SolValue,
};
use tokenship_deploy::{
    CompileError, CompiledContract, Compiler, CompilerSettings, Connector, DeployError,
    DeployEvent, DeployOptions, DeploymentRequest, DeploymentStore, ExplorerConfig,
    NetworkProfile, NetworkRegistry, Secret, Stage, VerificationOutcome, VerificationRequest,
    VerificationService, VerificationStatus, VerifyError,
    compiler::{SourceSet, StandardJsonInput},
    rpc::{CallRequest, ChainProvider, RpcError, TransactionReceipt},
    transaction::DeployerKey,
};
use tokio::sync::mpsc;
use url::Url;

const BYTECODE: [u8; 4] = [0x60, 0x80, 0x60, 0x40];
const INCLUSION_BLOCK: u64 = 101;
const CONTRACT_ADDRESS: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
const DEPLOYER_KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

// -- Compiler ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeCompiler {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl Compiler for FakeCompiler {
    async fn compile(&self) -> Result<CompiledContract, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CompileError::Diagnostics(vec![
                "contracts/Token.sol:3:5: ParserError: Expected ';'".to_string(),
            ]));
        }
        let sources = SourceSet::from_units([(
            "contracts/Token.sol".to_string(),
            "contract Token {}".to_string(),
        )]);
        Ok(CompiledContract {
            name: "Token".to_string(),
            qualified_name: "contracts/Token.sol:Token".to_string(),
            bytecode: Bytes::from_static(&BYTECODE),
            abi: serde_json::json!([]),
            input: StandardJsonInput::new(&sources, &CompilerSettings::default()),
            compiler_version: "v0.8.6+commit.11564f7e".to_string(),
        })
    }
}

// -- Chain ------------------------------------------------------------------------------

#[derive(Debug)]
struct ChainState {
    /// Every provider method called, in order.
    calls: Vec<&'static str>,
    /// Next value returned by `eth_blockNumber`; advances one block per call.
    next_head: u64,
    last_head: Option<u64>,
    /// Receipt polls answered with `null` before the transaction is mined.
    pending_polls: usize,
    receipt_block: u64,
    /// Once the head reaches `.0`, the transaction moves to block `.1`.
    reorg: Option<(u64, u64)>,
    /// The transaction is reverted in the block it moves to.
    reverted_after_reorg: bool,
    reverted: bool,
    /// The head never advances.
    stalled: bool,
    /// Every other `eth_blockNumber` call fails, and the head advances every 8 calls.
    flaky_head: bool,
    block_calls: u64,
    never_mined: bool,
    reject_estimate: bool,
    estimated_data: Option<Bytes>,
    sent: Option<B256>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_head: INCLUSION_BLOCK,
            last_head: None,
            pending_polls: 1,
            receipt_block: INCLUSION_BLOCK,
            reorg: None,
            reverted_after_reorg: false,
            reverted: false,
            stalled: false,
            flaky_head: false,
            block_calls: 0,
            never_mined: false,
            reject_estimate: false,
            estimated_data: None,
            sent: None,
        }
    }
}

type Chain = Arc<Mutex<ChainState>>;

#[derive(Clone)]
struct FakeProvider {
    chain: Chain,
}

impl FakeProvider {
    fn record(&self, method: &'static str) -> std::sync::MutexGuard<'_, ChainState> {
        let mut chain = self.chain.lock().unwrap();
        chain.calls.push(method);
        chain
    }
}

impl ChainProvider for FakeProvider {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        self.record("eth_chainId");
        Ok(56)
    }

    async fn transaction_count(&self, _address: Address) -> anyhow::Result<u64> {
        self.record("eth_getTransactionCount");
        Ok(3)
    }

    async fn gas_price(&self) -> anyhow::Result<u128> {
        self.record("eth_gasPrice");
        Ok(5_000_000_000)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> anyhow::Result<u64> {
        let mut chain = self.record("eth_estimateGas");
        if chain.reject_estimate {
            return Err(RpcError {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            }
            .into());
        }
        chain.estimated_data = Some(call.data.clone());
        Ok(1_500_000)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> anyhow::Result<B256> {
        let mut chain = self.record("eth_sendRawTransaction");
        let hash = keccak256(raw);
        chain.sent = Some(hash);
        Ok(hash)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> anyhow::Result<Option<TransactionReceipt>> {
        let mut chain = self.record("eth_getTransactionReceipt");
        assert_eq!(chain.sent, Some(tx_hash));

        if chain.never_mined {
            return Ok(None);
        }
        if chain.pending_polls > 0 {
            chain.pending_polls -= 1;
            return Ok(None);
        }

        let (block, reverted) = match (chain.reorg, chain.last_head) {
            (Some((at, moved_to)), Some(head)) if head >= at => {
                (moved_to, chain.reverted_after_reorg)
            }
            _ => (chain.receipt_block, chain.reverted),
        };
        Ok(Some(TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: block,
            contract_address: Some(CONTRACT_ADDRESS),
            status: Some(!reverted),
        }))
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let mut chain = self.record("eth_blockNumber");
        chain.block_calls += 1;

        let head = if chain.flaky_head {
            if chain.block_calls % 2 == 1 {
                anyhow::bail!("transient");
            }
            INCLUSION_BLOCK + chain.block_calls / 8
        } else if chain.stalled {
            chain.next_head
        } else {
            chain.next_head += 1;
            chain.next_head - 1
        };
        chain.last_head = Some(head);
        Ok(head)
    }
}

// -- Explorer ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct VerifierCall {
    request: VerificationRequest,
    head: Option<u64>,
}

#[derive(Clone)]
struct FakeVerifier {
    chain: Chain,
    reject: bool,
    calls: Arc<Mutex<Vec<VerifierCall>>>,
}

impl VerificationService for FakeVerifier {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, VerifyError> {
        let head = self.chain.lock().unwrap().last_head;
        self.calls.lock().unwrap().push(VerifierCall {
            request: request.clone(),
            head,
        });

        if self.reject {
            Err(VerifyError::Rejected("Fail - Unable to verify".to_string()))
        } else {
            Ok(VerificationOutcome::Verified)
        }
    }
}

#[derive(Clone, Default)]
struct FakeConnector {
    chain: Chain,
    reject_verification: bool,
    providers_built: Arc<AtomicUsize>,
    verifier_calls: Arc<Mutex<Vec<VerifierCall>>>,
}

impl Connector for FakeConnector {
    type Provider = FakeProvider;
    type Verifier = FakeVerifier;

    fn provider(&self, _network: &NetworkProfile) -> anyhow::Result<FakeProvider> {
        self.providers_built.fetch_add(1, Ordering::SeqCst);
        Ok(FakeProvider {
            chain: self.chain.clone(),
        })
    }

    fn verifier(&self, network: &NetworkProfile) -> anyhow::Result<Option<FakeVerifier>> {
        Ok(network.verification_explorer().map(|_| FakeVerifier {
            chain: self.chain.clone(),
            reject: self.reject_verification,
            calls: self.verifier_calls.clone(),
        }))
    }
}

// -- Helpers ----------------------------------------------------------------------------

fn explorer() -> ExplorerConfig {
    ExplorerConfig {
        api_url: Url::parse("https://api.bscscan.com/api").unwrap(),
        api_key: Some(Secret::new("bscscan-key")),
    }
}

fn bsc_mainnet() -> NetworkProfile {
    NetworkProfile::new("bsc_mainnet", Url::parse("https://bsc-dataseed.binance.org/").unwrap())
        .with_chain_id(56)
        .with_account(DEPLOYER_KEY)
        .with_explorer(explorer())
}

fn request() -> DeploymentRequest {
    DeploymentRequest::new(
        address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
        "Tokenship",
        "TSP",
        address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
    )
}

fn options() -> DeployOptions {
    DeployOptions {
        poll_interval: Duration::from_secs(1),
        ..DeployOptions::default()
    }
}

struct Harness {
    compiler: FakeCompiler,
    connector: FakeConnector,
}

impl Harness {
    fn new() -> Self {
        Self {
            compiler: FakeCompiler::default(),
            connector: FakeConnector::default(),
        }
    }

    fn with_chain(self, configure: impl FnOnce(&mut ChainState)) -> Self {
        configure(&mut self.connector.chain.lock().unwrap());
        self
    }

    fn failing_compilation(mut self) -> Self {
        self.compiler.fail = true;
        self
    }

    fn rejecting_verification(mut self) -> Self {
        self.connector.reject_verification = true;
        self
    }

    async fn deploy(
        &self,
        network: &NetworkProfile,
        options: DeployOptions,
    ) -> (Result<tokenship_deploy::DeploymentResult, DeployError>, Vec<DeployEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator =
            tokenship_deploy::Orchestrator::new(self.compiler.clone(), self.connector.clone(), options)
                .with_events(tx);

        let result = orchestrator.deploy(network, &request()).await;
        drop(orchestrator);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    fn provider_calls(&self) -> Vec<&'static str> {
        self.connector.chain.lock().unwrap().calls.clone()
    }

    fn verifier_calls(&self) -> Vec<VerifierCall> {
        self.connector.verifier_calls.lock().unwrap().clone()
    }
}

fn position(events: &[DeployEvent], matches: impl Fn(&DeployEvent) -> bool) -> usize {
    events
        .iter()
        .position(matches)
        .unwrap_or_else(|| panic!("event not found in {events:#?}"))
}

// -- Tests ------------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_happy_path_event_order() {
    let harness = Harness::new();
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;
    let result = result.unwrap();

    let compiled = position(&events, |e| matches!(e, DeployEvent::Compiled { .. }));
    let included = position(&events, |e| {
        matches!(e, DeployEvent::Included { address, block, .. }
            if *address == CONTRACT_ADDRESS && *block == INCLUSION_BLOCK)
    });
    let confirmed = position(&events, |e| *e == DeployEvent::Confirmed { observed: 7 });
    let verified = position(&events, |e| {
        *e == DeployEvent::Verified {
            address: CONTRACT_ADDRESS,
        }
    });
    assert!(compiled < included && included < confirmed && confirmed < verified);

    let stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            DeployEvent::StageStarted(stage) => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            Stage::Compiling,
            Stage::Submitting,
            Stage::AwaitingInclusion,
            Stage::AwaitingConfirmations,
            Stage::Verifying,
        ]
    );

    assert_eq!(result.network, "bsc_mainnet");
    assert_eq!(result.address, CONTRACT_ADDRESS);
    assert_eq!(result.block_number, INCLUSION_BLOCK);
    assert_eq!(result.confirmations, 7);
    assert_eq!(result.verification, VerificationStatus::Verified);
    assert_eq!(
        result.deployer,
        DeployerKey::parse(&Secret::new(DEPLOYER_KEY)).unwrap().address()
    );
    assert_eq!(harness.compiler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_network_touches_nothing() {
    let harness = Harness::new();
    let registry = NetworkRegistry::builtin(|_| None);
    let orchestrator = tokenship_deploy::Orchestrator::new(
        harness.compiler.clone(),
        harness.connector.clone(),
        options(),
    );

    let err = orchestrator
        .deploy_named(&registry, "ropsten", &request())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::UnknownNetwork(ref name) if name == "ropsten"));
    assert_eq!(harness.compiler.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.connector.providers_built.load(Ordering::SeqCst), 0);
    assert!(harness.provider_calls().is_empty());
    assert!(harness.verifier_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_credentials_make_no_provider_call() {
    let harness = Harness::new();
    let mut network = bsc_mainnet();
    network.accounts.clear();

    let (result, events) = harness.deploy(&network, options()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::NoCredentialAvailable { ref network } if network == "bsc_mainnet"));
    assert_eq!(err.stage(), Some(Stage::Submitting));
    assert_eq!(harness.connector.providers_built.load(Ordering::SeqCst), 0);
    assert!(harness.provider_calls().is_empty());
    assert!(!events.iter().any(|e| matches!(e, DeployEvent::Submitted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_constructor_arguments_are_encoded_in_order() {
    let harness = Harness::new();
    let (result, _) = harness.deploy(&bsc_mainnet(), options()).await;
    result.unwrap();

    let request = request();
    let expected =
        (request.owner, request.name.clone(), request.symbol.clone(), request.fee).abi_encode_params();

    let data = harness
        .connector
        .chain
        .lock()
        .unwrap()
        .estimated_data
        .clone()
        .unwrap();
    assert_eq!(&data[..BYTECODE.len()], &BYTECODE);
    assert_eq!(&data[BYTECODE.len()..], expected.as_slice());

    let calls = harness.verifier_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.constructor_args, expected);
    assert_eq!(calls[0].request.address, CONTRACT_ADDRESS);
    assert_eq!(calls[0].request.contract_name, "contracts/Token.sol:Token");
    assert_eq!(calls[0].request.compiler_version, "v0.8.6+commit.11564f7e");
}

#[tokio::test(start_paused = true)]
async fn test_verification_waits_for_confirmation_threshold() {
    let harness = Harness::new();
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;
    result.unwrap();

    let calls = harness.verifier_calls();
    assert_eq!(calls.len(), 1);
    let head = calls[0].head.unwrap();
    assert!(head - INCLUSION_BLOCK >= 7, "verified at head {head}");

    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            DeployEvent::ConfirmationProgress { observed, required } => {
                assert_eq!(*required, 7);
                Some(*observed)
            }
            _ => None,
        })
        .collect();
    assert_eq!(progress, (0..=7).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_custom_confirmation_threshold() {
    let harness = Harness::new();
    let options = DeployOptions {
        confirmations: 2,
        ..options()
    };
    let (result, _) = harness.deploy(&bsc_mainnet(), options).await;
    let result = result.unwrap();

    assert_eq!(result.confirmations, 2);
    assert_eq!(harness.verifier_calls()[0].head, Some(INCLUSION_BLOCK + 2));
}

#[tokio::test(start_paused = true)]
async fn test_verification_failure_keeps_deployment() {
    let harness = Harness::new().rejecting_verification();
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;
    let result = result.unwrap();

    let included_address = events
        .iter()
        .find_map(|e| match e {
            DeployEvent::Included { address, .. } => Some(*address),
            _ => None,
        })
        .unwrap();

    assert_eq!(result.address, included_address);
    assert!(matches!(
        result.verification,
        VerificationStatus::Failed(ref reason) if reason.contains("Unable to verify")
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        DeployEvent::VerificationFailed { address, .. } if *address == included_address
    )));
}

#[tokio::test(start_paused = true)]
async fn test_verification_skipped_without_explorer_key() {
    let harness = Harness::new();
    let mut network = bsc_mainnet();
    network.explorer = Some(ExplorerConfig {
        api_key: None,
        ..explorer()
    });

    let (result, events) = harness.deploy(&network, options()).await;
    let result = result.unwrap();

    assert!(matches!(result.verification, VerificationStatus::Skipped(_)));
    assert!(harness.verifier_calls().is_empty());
    assert!(events.iter().any(|e| matches!(e, DeployEvent::VerificationSkipped { .. })));
    assert!(!events.contains(&DeployEvent::StageStarted(Stage::Verifying)));
}

#[tokio::test(start_paused = true)]
async fn test_verification_disabled() {
    let harness = Harness::new();
    let options = DeployOptions {
        verify: false,
        ..options()
    };
    let (result, _) = harness.deploy(&bsc_mainnet(), options).await;

    assert_eq!(
        result.unwrap().verification,
        VerificationStatus::Skipped("verification disabled".to_string())
    );
    assert!(harness.verifier_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_chain_id_is_queried_when_unknown() {
    let harness = Harness::new();
    let mut network = bsc_mainnet();
    network.chain_id = None;

    let (result, _) = harness.deploy(&network, options()).await;
    result.unwrap();

    let calls = harness.provider_calls();
    assert_eq!(
        &calls[..5],
        &[
            "eth_chainId",
            "eth_getTransactionCount",
            "eth_gasPrice",
            "eth_estimateGas",
            "eth_sendRawTransaction",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission() {
    let harness = Harness::new().with_chain(|chain| chain.reject_estimate = true);
    let (result, _) = harness.deploy(&bsc_mainnet(), options()).await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        DeployError::SubmissionRejected { ref reason, .. } if reason.contains("insufficient funds")
    ));
    assert!(!harness.provider_calls().contains(&"eth_sendRawTransaction"));
}

#[tokio::test(start_paused = true)]
async fn test_reverted_deployment() {
    let harness = Harness::new().with_chain(|chain| chain.reverted = true);
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;

    assert!(matches!(
        result.unwrap_err(),
        DeployError::Reverted { block_number: INCLUSION_BLOCK, .. }
    ));
    assert!(!events.iter().any(|e| matches!(e, DeployEvent::Included { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_inclusion_timeout() {
    let harness = Harness::new().with_chain(|chain| chain.never_mined = true);
    let options = DeployOptions {
        inclusion_timeout: Some(Duration::from_secs(30)),
        ..options()
    };
    let (result, _) = harness.deploy(&bsc_mainnet(), options).await;

    let sent = harness.connector.chain.lock().unwrap().sent.unwrap();
    assert!(matches!(
        result.unwrap_err(),
        DeployError::Timeout { stage: Stage::AwaitingInclusion, tx_hash, .. } if tx_hash == sent
    ));
    assert!(harness.verifier_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reorg_restarts_confirmation_count() {
    let harness = Harness::new().with_chain(|chain| chain.reorg = Some((104, 103)));
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;
    let result = result.unwrap();

    assert!(events.contains(&DeployEvent::Reorged {
        previous_block: INCLUSION_BLOCK,
        block: 103,
    }));
    assert_eq!(result.block_number, 103);
    assert_eq!(result.confirmations, 7);
    assert_eq!(harness.verifier_calls()[0].head, Some(110));
}

#[tokio::test(start_paused = true)]
async fn test_records_are_saved() {
    let dir = tempdir::TempDir::new("tokenship-orchestrator").unwrap();
    let store = DeploymentStore::new(dir.path());
    let harness = Harness::new();

    let orchestrator = tokenship_deploy::Orchestrator::new(
        harness.compiler.clone(),
        harness.connector.clone(),
        options(),
    )
    .with_records(store.clone());
    let result = orchestrator.deploy(&bsc_mainnet(), &request()).await.unwrap();

    let record = store.load("bsc_mainnet", "Token").unwrap();
    assert_eq!(record.address, result.address);
    assert_eq!(record.transaction_hash, result.tx_hash);
    assert_eq!(record.confirmations, 7);
    assert_eq!(record.constructor_args, request().constructor_arguments());
    assert_eq!(record.verification, Some(VerificationStatus::Verified));
}

#[tokio::test(start_paused = true)]
async fn test_standalone_verify() {
    let harness = Harness::new();
    let orchestrator = tokenship_deploy::Orchestrator::new(
        harness.compiler.clone(),
        harness.connector.clone(),
        options(),
    );
    let args = request().constructor_arguments();

    let outcome = orchestrator
        .verify(&bsc_mainnet(), CONTRACT_ADDRESS, &args)
        .await
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::Verified);
    assert!(harness.provider_calls().is_empty());
    assert_eq!(harness.verifier_calls()[0].request.constructor_args, args.abi_encode());

    let mut network = bsc_mainnet();
    network.explorer = None;
    let err = orchestrator
        .verify(&network, CONTRACT_ADDRESS, &args)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::VerificationFailed(VerifyError::NotConfigured(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_compilation_failure_is_fatal() {
    let harness = Harness::new().failing_compilation();
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::Compilation(CompileError::Diagnostics(_))));
    assert_eq!(err.stage(), Some(Stage::Compiling));

    assert_eq!(harness.compiler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.connector.providers_built.load(Ordering::SeqCst), 0);
    assert!(harness.provider_calls().is_empty());
    assert!(harness.verifier_calls().is_empty());
    assert_eq!(events, vec![DeployEvent::StageStarted(Stage::Compiling)]);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout() {
    let harness = Harness::new().with_chain(|chain| chain.stalled = true);
    let options = DeployOptions {
        confirmation_timeout: Some(Duration::from_secs(60)),
        ..options()
    };
    let (result, events) = harness.deploy(&bsc_mainnet(), options).await;

    let sent = harness.connector.chain.lock().unwrap().sent.unwrap();
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        DeployError::Timeout { stage: Stage::AwaitingConfirmations, tx_hash, elapsed }
            if tx_hash == sent && elapsed == Duration::from_secs(60)
    ));
    assert!(events.iter().any(|e| matches!(e, DeployEvent::Included { .. })));
    assert!(!events.iter().any(|e| matches!(e, DeployEvent::Confirmed { .. })));
    assert!(harness.verifier_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scattered_poll_failures_are_tolerated() {
    let harness = Harness::new().with_chain(|chain| chain.flaky_head = true);
    let (result, _) = harness.deploy(&bsc_mainnet(), options()).await;

    let result = result.unwrap();
    assert_eq!(result.confirmations, 7);
    assert_eq!(result.verification, VerificationStatus::Verified);
    assert!(harness.connector.chain.lock().unwrap().block_calls > 3);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_after_reorg() {
    let harness = Harness::new().with_chain(|chain| {
        chain.reorg = Some((104, 103));
        chain.reverted_after_reorg = true;
    });
    let (result, events) = harness.deploy(&bsc_mainnet(), options()).await;

    assert!(matches!(
        result.unwrap_err(),
        DeployError::Reverted { block_number: 103, .. }
    ));
    assert!(!events.iter().any(|e| matches!(e, DeployEvent::Confirmed { .. })));
    assert!(harness.verifier_calls().is_empty());
}

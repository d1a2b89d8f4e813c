//! The deployment pipeline.
//!
//! An [`Orchestrator`] deploys the compiled contract to one network in five strictly
//! sequential stages: compile, submit, wait for inclusion, wait for confirmations, and
//! verify. Progress is reported as [`DeployEvent`]s on an optional channel; the outcome is
//! a [`DeploymentResult`] or a [`DeployError`] naming the stage that failed.
//!
//! Dropping the future returned by [`Orchestrator::deploy`] cancels the deployment. A
//! transaction that was already broadcast stays in the node's mempool.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, U256};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    ConstructorArguments, DeployError, DeploymentRecord, DeploymentRequest, DeploymentStore,
    NetworkProfile, NetworkRegistry,
    compiler::{CompiledContract, Compiler},
    rpc::{CallRequest, ChainProvider, JsonRpcProvider, RpcError, TransactionReceipt},
    transaction::{DeployerKey, creation_transaction},
    verify::{
        EtherscanVerifier, VerificationOutcome, VerificationRequest, VerificationService,
        VerifierSettings, VerifyError,
    },
};

/// Default number of blocks to wait on top of the deployment block.
pub const DEFAULT_CONFIRMATIONS: u64 = 7;

/// Consecutive failed polls tolerated before a wait is abandoned.
const MAX_POLL_FAILURES: u32 = 3;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[strum(serialize = "compiling")]
    Compiling,
    #[strum(serialize = "submitting")]
    Submitting,
    #[strum(serialize = "awaiting inclusion")]
    AwaitingInclusion,
    #[strum(serialize = "awaiting confirmations")]
    AwaitingConfirmations,
    #[strum(serialize = "verifying")]
    Verifying,
}

/// Progress notifications, emitted in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    StageStarted(Stage),
    Compiled {
        contract: String,
        bytecode_len: usize,
    },
    Submitted {
        tx_hash: B256,
        from: Address,
        nonce: u64,
    },
    /// The transaction was mined and the contract address is known.
    Included {
        address: Address,
        block: u64,
        tx_hash: B256,
    },
    /// The transaction moved to another block while waiting for confirmations.
    Reorged {
        previous_block: u64,
        block: u64,
    },
    ConfirmationProgress {
        observed: u64,
        required: u64,
    },
    Confirmed {
        observed: u64,
    },
    Verified {
        address: Address,
    },
    VerificationFailed {
        address: Address,
        reason: String,
    },
    VerificationSkipped {
        reason: String,
    },
}

/// How a deployment was verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    /// The explorer refused the sources. The contract is deployed regardless.
    Failed(String),
    Skipped(String),
}

/// Pipeline parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Blocks mined on top of the deployment block before verification may start.
    pub confirmations: u64,
    /// Whether to run the verification stage.
    pub verify: bool,
    /// Delay between receipt and block number polls.
    pub poll_interval: Duration,
    /// Bound on the wait for inclusion. `None` waits forever.
    pub inclusion_timeout: Option<Duration>,
    /// Bound on the wait for confirmations. `None` waits forever.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            verify: true,
            poll_interval: Duration::from_secs(4),
            inclusion_timeout: Some(Duration::from_secs(10 * 60)),
            confirmation_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// State of one in-flight deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHandle {
    pub tx_hash: B256,
    pub sender: Address,
    pub nonce: u64,
    /// Known once the transaction is mined.
    pub contract_address: Option<Address>,
    /// The block holding the transaction. Updated on re-orgs.
    pub inclusion_block: Option<u64>,
}

/// A contract that made it on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub network: String,
    /// Fully qualified contract name.
    pub contract: String,
    pub address: Address,
    pub tx_hash: B256,
    pub deployer: Address,
    pub block_number: u64,
    pub confirmations: u64,
    pub verification: VerificationStatus,
}

/// Builds the network clients for a profile.
pub trait Connector: Send + Sync {
    type Provider: ChainProvider;
    type Verifier: VerificationService;

    fn provider(&self, network: &NetworkProfile) -> anyhow::Result<Self::Provider>;

    /// `Ok(None)` when the network has no usable explorer.
    fn verifier(&self, network: &NetworkProfile) -> anyhow::Result<Option<Self::Verifier>>;
}

/// [`Connector`] for real networks: JSON-RPC over HTTP and Etherscan-compatible explorers.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    pub rpc_timeout: Option<Duration>,
    pub verifier: VerifierSettings,
}

impl HttpConnector {
    pub fn new(verifier: VerifierSettings) -> Self {
        Self {
            rpc_timeout: None,
            verifier,
        }
    }
}

impl Connector for HttpConnector {
    type Provider = JsonRpcProvider;
    type Verifier = EtherscanVerifier;

    fn provider(&self, network: &NetworkProfile) -> anyhow::Result<JsonRpcProvider> {
        match self.rpc_timeout {
            Some(timeout) => JsonRpcProvider::with_timeout(network.rpc_url.clone(), timeout),
            None => JsonRpcProvider::new(network.rpc_url.clone()),
        }
    }

    fn verifier(&self, network: &NetworkProfile) -> anyhow::Result<Option<EtherscanVerifier>> {
        match network.verification_explorer() {
            Some(explorer) => EtherscanVerifier::for_explorer(explorer, self.verifier),
            None => Ok(None),
        }
    }
}

/// Runs the deployment pipeline.
#[derive(Debug)]
pub struct Orchestrator<C, N = HttpConnector> {
    compiler: C,
    connector: N,
    options: DeployOptions,
    events: Option<UnboundedSender<DeployEvent>>,
    records: Option<DeploymentStore>,
}

impl<C: Compiler, N: Connector> Orchestrator<C, N> {
    pub fn new(compiler: C, connector: N, options: DeployOptions) -> Self {
        Self {
            compiler,
            connector,
            options,
            events: None,
            records: None,
        }
    }

    /// Report progress on `events`.
    pub fn with_events(mut self, events: UnboundedSender<DeployEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Persist a [`DeploymentRecord`] for every contract that gets mined.
    pub fn with_records(mut self, records: DeploymentStore) -> Self {
        self.records = Some(records);
        self
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Resolve `network` in `registry` and deploy to it.
    pub async fn deploy_named(
        &self,
        registry: &NetworkRegistry,
        network: &str,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, DeployError> {
        let profile = registry.resolve(network)?;
        self.deploy(profile, request).await
    }

    /// Deploy the contract to `network`.
    ///
    /// Verification problems do not fail the deployment; they are reported in
    /// [`DeploymentResult::verification`].
    pub async fn deploy(
        &self,
        network: &NetworkProfile,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, DeployError> {
        tracing::info!(
            network = %network.name,
            owner = %request.owner,
            name = %request.name,
            symbol = %request.symbol,
            fee = %request.fee,
            "Starting deployment"
        );

        let contract = self.compile().await?;
        let args = request.constructor_arguments();

        self.emit(DeployEvent::StageStarted(Stage::Submitting));
        let credential = network
            .first_credential()
            .ok_or_else(|| DeployError::NoCredentialAvailable {
                network: network.name.clone(),
            })?;
        let key = DeployerKey::parse(credential).map_err(|e| DeployError::InvalidCredential {
            network: network.name.clone(),
            reason: format!("{e:#}"),
        })?;
        let provider = self
            .connector
            .provider(network)
            .map_err(|e| DeployError::provider(Stage::Submitting, e))?;

        let mut handle = self.submit(&provider, network, &key, &contract, &args).await?;

        self.emit(DeployEvent::StageStarted(Stage::AwaitingInclusion));
        let address = self.await_inclusion(&provider, &mut handle).await?;
        let mut record = self.save_record(network, &contract, &handle, address, &args);

        self.emit(DeployEvent::StageStarted(Stage::AwaitingConfirmations));
        let confirmations = self.await_confirmations(&provider, &mut handle).await?;

        let verification = if self.options.verify {
            self.verify_deployment(network, &contract, address, &args).await
        } else {
            let reason = "verification disabled".to_string();
            self.emit(DeployEvent::VerificationSkipped {
                reason: reason.clone(),
            });
            VerificationStatus::Skipped(reason)
        };

        let block_number = handle.inclusion_block.unwrap_or_default();
        if let Some((store, record)) = self.records.as_ref().zip(record.as_mut()) {
            record.block_number = block_number;
            record.confirmations = confirmations;
            record.verification = Some(verification.clone());
            if let Err(e) = store.save(record) {
                tracing::warn!(error = %e, "Failed to update deployment record");
            }
        }

        tracing::info!(
            network = %network.name,
            address = %address,
            tx_hash = %handle.tx_hash,
            block = block_number,
            "Deployment complete"
        );

        Ok(DeploymentResult {
            network: network.name.clone(),
            contract: contract.qualified_name,
            address,
            tx_hash: handle.tx_hash,
            deployer: handle.sender,
            block_number,
            confirmations,
            verification,
        })
    }

    /// Verify an already deployed contract.
    pub async fn verify(
        &self,
        network: &NetworkProfile,
        address: Address,
        args: &ConstructorArguments,
    ) -> Result<VerificationOutcome, DeployError> {
        let contract = self.compile().await?;

        self.emit(DeployEvent::StageStarted(Stage::Verifying));
        let verifier = self
            .connector
            .verifier(network)
            .map_err(|e| DeployError::provider(Stage::Verifying, e))?
            .ok_or_else(|| VerifyError::NotConfigured(network.name.clone()))?;

        let request = VerificationRequest::new(&contract, address, args.abi_encode());
        match verifier.verify(&request).await {
            Ok(outcome) => {
                self.emit(DeployEvent::Verified { address });
                Ok(outcome)
            }
            Err(e) => {
                self.emit(DeployEvent::VerificationFailed {
                    address,
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    async fn compile(&self) -> Result<CompiledContract, DeployError> {
        self.emit(DeployEvent::StageStarted(Stage::Compiling));
        let contract = self.compiler.compile().await?;
        self.emit(DeployEvent::Compiled {
            contract: contract.qualified_name.clone(),
            bytecode_len: contract.bytecode.len(),
        });
        Ok(contract)
    }

    async fn submit(
        &self,
        provider: &N::Provider,
        network: &NetworkProfile,
        key: &DeployerKey,
        contract: &CompiledContract,
        args: &ConstructorArguments,
    ) -> Result<DeploymentHandle, DeployError> {
        let rpc = |e| DeployError::provider(Stage::Submitting, e);
        let rejected = |e: anyhow::Error| match e.downcast_ref::<RpcError>() {
            Some(rpc_error) => DeployError::SubmissionRejected {
                network: network.name.clone(),
                reason: rpc_error.message.clone(),
            },
            None => DeployError::provider(Stage::Submitting, e),
        };

        let from = key.address();
        let chain_id = match network.chain_id {
            Some(chain_id) => chain_id,
            None => provider.chain_id().await.map_err(rpc)?,
        };
        let nonce = provider.transaction_count(from).await.map_err(rpc)?;
        let gas_price = provider.gas_price().await.map_err(rpc)?;

        let init_code = args.init_code(&contract.bytecode);
        let gas_limit = provider
            .estimate_gas(&CallRequest {
                from,
                data: init_code.clone().into(),
                value: U256::ZERO,
            })
            .await
            .map_err(rejected)?;

        let tx = creation_transaction(
            init_code.into(),
            nonce,
            gas_price,
            gas_limit,
            Some(chain_id),
        );
        let signed = key.sign(tx).map_err(|e| DeployError::InvalidCredential {
            network: network.name.clone(),
            reason: format!("{e:#}"),
        })?;

        let tx_hash = provider
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(rejected)?;
        if tx_hash != signed.hash {
            tracing::warn!(
                expected = %signed.hash,
                reported = %tx_hash,
                "Node reported an unexpected transaction hash"
            );
        }

        tracing::info!(
            network = %network.name,
            tx_hash = %tx_hash,
            from = %from,
            nonce,
            gas_limit,
            gas_price,
            chain_id,
            "Deployment transaction submitted"
        );
        self.emit(DeployEvent::Submitted {
            tx_hash,
            from,
            nonce,
        });

        Ok(DeploymentHandle {
            tx_hash,
            sender: from,
            nonce,
            contract_address: None,
            inclusion_block: None,
        })
    }

    async fn await_inclusion(
        &self,
        provider: &N::Provider,
        handle: &mut DeploymentHandle,
    ) -> Result<Address, DeployError> {
        let tx_hash = handle.tx_hash;
        let stage = Stage::AwaitingInclusion;

        let receipt = bounded(self.options.inclusion_timeout, stage, tx_hash, async {
            let mut failures = 0;
            loop {
                match provider.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok::<_, DeployError>(receipt),
                    Ok(None) => failures = 0,
                    Err(e) => tolerate(&mut failures, stage, e)?,
                }
                tokio::time::sleep(self.options.poll_interval).await;
            }
        })
        .await?;

        if !receipt.succeeded() {
            return Err(DeployError::Reverted {
                tx_hash,
                block_number: receipt.block_number,
            });
        }
        let address = receipt
            .contract_address
            .ok_or(DeployError::MissingContractAddress { tx_hash })?;

        handle.contract_address = Some(address);
        handle.inclusion_block = Some(receipt.block_number);

        tracing::info!(address = %address, block = receipt.block_number, "Contract deployed");
        self.emit(DeployEvent::Included {
            address,
            block: receipt.block_number,
            tx_hash,
        });

        Ok(address)
    }

    /// Wait until `head - inclusion_block >= confirmations`, following re-orgs.
    async fn await_confirmations(
        &self,
        provider: &N::Provider,
        handle: &mut DeploymentHandle,
    ) -> Result<u64, DeployError> {
        let tx_hash = handle.tx_hash;
        let stage = Stage::AwaitingConfirmations;
        let required = self.options.confirmations;

        tracing::info!(required, "Waiting for confirmations");

        bounded(self.options.confirmation_timeout, stage, tx_hash, async {
            let mut failures = 0;
            let mut last_head = None;
            let mut last_reported = None;

            loop {
                let head = match provider.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        tolerate(&mut failures, stage, e)?;
                        tokio::time::sleep(self.options.poll_interval).await;
                        continue;
                    }
                };

                if last_head != Some(head) {
                    match provider.transaction_receipt(tx_hash).await {
                        Ok(receipt) => {
                            last_head = Some(head);
                            self.follow_reorg(handle, receipt.as_ref())?;
                        }
                        Err(e) => {
                            tolerate(&mut failures, stage, e)?;
                            tokio::time::sleep(self.options.poll_interval).await;
                            continue;
                        }
                    }
                }
                failures = 0;

                if let Some(block) = handle.inclusion_block {
                    let observed = head.saturating_sub(block);
                    if last_reported != Some(observed) {
                        last_reported = Some(observed);
                        tracing::debug!(observed, required, "Confirmation progress");
                        self.emit(DeployEvent::ConfirmationProgress { observed, required });
                    }
                    if observed >= required {
                        tracing::info!(observed, "Confirmed");
                        self.emit(DeployEvent::Confirmed { observed });
                        return Ok::<_, DeployError>(observed);
                    }
                }

                tokio::time::sleep(self.options.poll_interval).await;
            }
        })
        .await
    }

    /// Track the block holding the transaction. A missing receipt means the transaction
    /// left the canonical chain; counting stops until it is mined again. A transaction
    /// mined again as reverted ends the deployment.
    fn follow_reorg(
        &self,
        handle: &mut DeploymentHandle,
        receipt: Option<&TransactionReceipt>,
    ) -> Result<(), DeployError> {
        if let Some(receipt) = receipt.filter(|r| !r.succeeded()) {
            return Err(DeployError::Reverted {
                tx_hash: handle.tx_hash,
                block_number: receipt.block_number,
            });
        }

        let current = receipt.map(|r| r.block_number);
        if current == handle.inclusion_block {
            return Ok(());
        }

        match (handle.inclusion_block, current) {
            (Some(previous_block), Some(block)) => {
                tracing::warn!(previous_block, block, "Deployment transaction re-orged");
                self.emit(DeployEvent::Reorged {
                    previous_block,
                    block,
                });
            }
            (Some(previous_block), None) => {
                tracing::warn!(previous_block, "Deployment transaction dropped by a re-org");
            }
            _ => {}
        }
        handle.inclusion_block = current;
        Ok(())
    }

    async fn verify_deployment(
        &self,
        network: &NetworkProfile,
        contract: &CompiledContract,
        address: Address,
        args: &ConstructorArguments,
    ) -> VerificationStatus {
        let verifier = match self.connector.verifier(network) {
            Ok(Some(verifier)) => verifier,
            Ok(None) => {
                let reason = format!("network `{}` has no explorer API key", network.name);
                tracing::info!(network = %network.name, "Skipping verification: {reason}");
                self.emit(DeployEvent::VerificationSkipped {
                    reason: reason.clone(),
                });
                return VerificationStatus::Skipped(reason);
            }
            Err(e) => {
                let reason = format!("{e:#}");
                self.emit(DeployEvent::VerificationFailed {
                    address,
                    reason: reason.clone(),
                });
                return VerificationStatus::Failed(reason);
            }
        };

        self.emit(DeployEvent::StageStarted(Stage::Verifying));
        let request = VerificationRequest::new(contract, address, args.abi_encode());
        match verifier.verify(&request).await {
            Ok(outcome) => {
                tracing::info!(address = %address, %outcome, "Contract verified");
                self.emit(DeployEvent::Verified { address });
                VerificationStatus::Verified
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(address = %address, error = %reason, "Verification failed");
                self.emit(DeployEvent::VerificationFailed {
                    address,
                    reason: reason.clone(),
                });
                VerificationStatus::Failed(reason)
            }
        }
    }

    fn save_record(
        &self,
        network: &NetworkProfile,
        contract: &CompiledContract,
        handle: &DeploymentHandle,
        address: Address,
        args: &ConstructorArguments,
    ) -> Option<DeploymentRecord> {
        let store = self.records.as_ref()?;
        let record = DeploymentRecord {
            network: network.name.clone(),
            contract: contract.name.clone(),
            qualified_name: contract.qualified_name.clone(),
            address,
            transaction_hash: handle.tx_hash,
            deployer: handle.sender,
            block_number: handle.inclusion_block.unwrap_or_default(),
            confirmations: 0,
            constructor_args: args.clone(),
            compiler_version: contract.compiler_version.clone(),
            verification: None,
            deployed_at: Utc::now(),
            tokenship_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        if let Err(e) = store.save(&record) {
            tracing::warn!(error = %e, "Failed to save deployment record");
        }
        Some(record)
    }

    fn emit(&self, event: DeployEvent) {
        tracing::trace!(?event, "Deploy event");
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}

/// Run `wait`, failing with [`DeployError::Timeout`] once `limit` elapses.
async fn bounded<T>(
    limit: Option<Duration>,
    stage: Stage,
    tx_hash: B256,
    wait: impl Future<Output = Result<T, DeployError>>,
) -> Result<T, DeployError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| DeployError::Timeout {
                stage,
                elapsed: limit,
                tx_hash,
            })?,
        None => wait.await,
    }
}

/// Count a failed poll, giving up after [`MAX_POLL_FAILURES`] in a row.
fn tolerate(failures: &mut u32, stage: Stage, error: anyhow::Error) -> Result<(), DeployError> {
    *failures += 1;
    if *failures >= MAX_POLL_FAILURES {
        return Err(DeployError::provider(stage, error));
    }
    tracing::warn!(%stage, error = %error, attempt = *failures, "Poll failed, retrying");
    Ok(())
}

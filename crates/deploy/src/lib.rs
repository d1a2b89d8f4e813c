//! tokenship-deploy - Deployment library for EVM token contracts.
//!
//! This crate compiles the project's Solidity sources, deploys the resulting contract to a
//! named network, waits for it to be confirmed and verifies its source on the network's
//! block explorer.

pub mod compiler;
pub mod config;
mod error;
pub mod network;
mod orchestrator;
mod record;
mod request;
pub mod rpc;
pub mod transaction;
pub mod verify;
pub mod wallet;

pub use compiler::{CompileError, CompiledContract, Compiler, CompilerSettings, SolcCompiler};
pub use config::{CONFIG_FILENAME, DeploySettings, ProjectConfig};
pub use error::DeployError;
pub use network::{
    DEFAULT_NETWORK, ExplorerConfig, NetworkConfig, NetworkProfile, NetworkRegistry, Secret,
};
pub use orchestrator::{
    Connector, DEFAULT_CONFIRMATIONS, DeployEvent, DeployOptions, DeploymentHandle,
    DeploymentResult, HttpConnector, Orchestrator, Stage, VerificationStatus,
};
pub use record::{DEFAULT_RECORDS_DIR, DeploymentRecord, DeploymentStore};
pub use request::{ConstructorArguments, DeploymentRequest, parse_address};
pub use rpc::{ChainProvider, JsonRpcProvider, TransactionReceipt};
pub use verify::{
    EtherscanVerifier, VerificationOutcome, VerificationRequest, VerificationService,
    VerifierSettings, VerifyError,
};
pub use wallet::{GeneratedWallet, generate_wallet};

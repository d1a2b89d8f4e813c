//! Source verification on block explorers.

mod etherscan;

use std::future::Future;

use alloy_core::primitives::Address;

use crate::compiler::{CompiledContract, StandardJsonInput};

pub use etherscan::{EtherscanVerifier, VerifierSettings};

/// Everything an explorer needs to reproduce the deployed bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub address: Address,
    /// Fully qualified contract name, e.g. `contracts/Token.sol:Token`.
    pub contract_name: String,
    /// Long compiler version, e.g. `v0.8.6+commit.11564f7e`.
    pub compiler_version: String,
    pub input: StandardJsonInput,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Vec<u8>,
}

impl VerificationRequest {
    pub fn new(contract: &CompiledContract, address: Address, constructor_args: Vec<u8>) -> Self {
        Self {
            address,
            contract_name: contract.qualified_name.clone(),
            compiler_version: contract.compiler_version.clone(),
            input: contract.input.clone(),
            constructor_args,
        }
    }
}

/// A successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VerificationOutcome {
    #[strum(serialize = "verified")]
    Verified,
    #[strum(serialize = "already verified")]
    AlreadyVerified,
}

/// Errors raised while verifying a contract.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The explorer compiled the sources and the result did not match the deployed code.
    #[error("explorer rejected the source: {0}")]
    Rejected(String),

    #[error("explorer API error: {0}")]
    Api(String),

    #[error("explorer has not indexed the contract bytecode: {0}")]
    NotIndexed(String),

    #[error("verification still pending: {0}")]
    StillPending(String),

    #[error("network `{0}` has no explorer API key configured")]
    NotConfigured(String),

    #[error("explorer request failed: {0:#}")]
    Transport(#[source] anyhow::Error),
}

/// Submits contract sources to an explorer and waits for the verdict.
pub trait VerificationService: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<VerificationOutcome, VerifyError>> + Send;
}

//! Error types surfaced by the deployment pipeline.

use std::time::Duration;

use alloy_core::primitives::B256;

use crate::{compiler::CompileError, orchestrator::Stage, verify::VerifyError};

/// Errors returned by [`crate::Orchestrator`] and the standalone verification entry point.
///
/// Every variant except [`DeployError::VerificationFailed`] aborts the deployment pipeline.
/// Verification failures during a deployment are reported through
/// [`crate::VerificationStatus::Failed`] instead, since the contract is already live.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    #[error("compilation failed: {0}")]
    Compilation(#[from] CompileError),

    #[error("network `{network}` has no signing credential configured")]
    NoCredentialAvailable { network: String },

    #[error("invalid signing credential for network `{network}`: {reason}")]
    InvalidCredential { network: String, reason: String },

    #[error("deployment transaction rejected by `{network}`: {reason}")]
    SubmissionRejected { network: String, reason: String },

    #[error("deployment transaction {tx_hash} reverted in block {block_number}")]
    Reverted { tx_hash: B256, block_number: u64 },

    #[error("receipt for {tx_hash} carries no contract address")]
    MissingContractAddress { tx_hash: B256 },

    #[error("timed out after {elapsed:?} while {stage} (transaction {tx_hash})")]
    Timeout {
        stage: Stage,
        elapsed: Duration,
        tx_hash: B256,
    },

    #[error("provider error while {stage}: {cause:#}")]
    Provider { stage: Stage, cause: anyhow::Error },

    #[error("verification failed: {0}")]
    VerificationFailed(#[from] VerifyError),
}

impl DeployError {
    /// Wraps a provider failure with the stage it occurred in.
    pub(crate) fn provider(stage: Stage, cause: anyhow::Error) -> Self {
        Self::Provider { stage, cause }
    }

    /// The stage the pipeline was in when this error was raised, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::UnknownNetwork(_) => None,
            Self::Compilation(_) => Some(Stage::Compiling),
            Self::NoCredentialAvailable { .. }
            | Self::InvalidCredential { .. }
            | Self::SubmissionRejected { .. } => Some(Stage::Submitting),
            Self::Reverted { .. } | Self::MissingContractAddress { .. } => {
                Some(Stage::AwaitingInclusion)
            }
            Self::Timeout { stage, .. } | Self::Provider { stage, .. } => Some(*stage),
            Self::VerificationFailed(_) => Some(Stage::Verifying),
        }
    }
}

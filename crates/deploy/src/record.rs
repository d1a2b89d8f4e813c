//! Deployment records persisted under `deployments/<network>/<Contract>.json`.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConstructorArguments, VerificationStatus};

/// Default directory holding deployment records, relative to the project root.
pub const DEFAULT_RECORDS_DIR: &str = "deployments";

/// What was deployed where, kept so that verification can be re-run later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    /// Contract name, e.g. `Token`.
    pub contract: String,
    /// Fully qualified contract name, e.g. `contracts/Token.sol:Token`.
    pub qualified_name: String,
    pub address: Address,
    pub transaction_hash: B256,
    pub deployer: Address,
    pub block_number: u64,
    pub confirmations: u64,
    pub constructor_args: ConstructorArguments,
    pub compiler_version: String,
    /// `None` until the verification stage has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationStatus>,
    pub deployed_at: DateTime<Utc>,
    /// Version of tokenship that created this record.
    pub tokenship_version: String,
}

impl DeploymentRecord {
    /// Save this record as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployment record to {}", path.display()))?;

        Ok(())
    }

    /// Load a record from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment record {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment record {}", path.display()))
    }
}

/// Directory of deployment records, one file per network and contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStore {
    root: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, network: &str, contract: &str) -> PathBuf {
        self.root.join(network).join(format!("{contract}.json"))
    }

    /// Write a record, replacing any previous deployment of the same contract.
    pub fn save(&self, record: &DeploymentRecord) -> Result<PathBuf> {
        let path = self.path(&record.network, &record.contract);
        record.save_to_file(&path)?;
        tracing::debug!(path = %path.display(), "Deployment record saved");
        Ok(path)
    }

    pub fn load(&self, network: &str, contract: &str) -> Result<DeploymentRecord> {
        DeploymentRecord::load_from_file(&self.path(network, contract))
    }
}

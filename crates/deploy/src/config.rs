//! Project configuration (`Tokenship.toml`).

use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    CompilerSettings, DeployOptions, NetworkConfig, NetworkRegistry, VerifierSettings,
    network::DEFAULT_NETWORK, record::DEFAULT_RECORDS_DIR,
};

/// The default name of the project configuration file.
pub const CONFIG_FILENAME: &str = "Tokenship.toml";

/// Pipeline settings as written in the configuration file.
///
/// Timeouts are in seconds; `0` waits forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Blocks mined on top of the deployment block before verification starts.
    pub confirmations: u64,
    /// Whether to verify the contract on the network's explorer.
    pub verify: bool,
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs")]
    pub inclusion_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub confirmation_timeout: Duration,
    /// Directory receiving deployment records.
    pub records_dir: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        let options = DeployOptions::default();
        Self {
            confirmations: options.confirmations,
            verify: options.verify,
            poll_interval: options.poll_interval,
            inclusion_timeout: options.inclusion_timeout.unwrap_or_default(),
            confirmation_timeout: options.confirmation_timeout.unwrap_or_default(),
            records_dir: DEFAULT_RECORDS_DIR.to_string(),
        }
    }
}

impl DeploySettings {
    pub fn options(&self) -> DeployOptions {
        let bound = |d: Duration| (!d.is_zero()).then_some(d);
        DeployOptions {
            confirmations: self.confirmations,
            verify: self.verify,
            poll_interval: self.poll_interval,
            inclusion_timeout: bound(self.inclusion_timeout),
            confirmation_timeout: bound(self.confirmation_timeout),
        }
    }
}

/// The whole project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Network used when none is given on the command line.
    pub default_network: String,
    pub compiler: CompilerSettings,
    pub deploy: DeploySettings,
    pub verifier: VerifierSettings,
    /// Additional networks, or overrides of the built-in ones.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            compiler: CompilerSettings::default(),
            deploy: DeploySettings::default(),
            verifier: VerifierSettings::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// The built-in networks plus the configured ones, with secrets read through `env`.
    pub fn registry<F>(&self, env: F) -> Result<NetworkRegistry>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = NetworkRegistry::builtin(&env);
        for (name, network) in &self.networks {
            let profile = network.clone().into_profile(name, &env)?;
            if registry.insert(profile).is_some() {
                tracing::debug!(network = %name, "Configured network overrides built-in profile");
            }
        }
        Ok(registry)
    }
}

/// Serde adapter for durations written as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

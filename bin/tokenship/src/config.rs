//! Layered loading of the project configuration.

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tokenship_deploy::ProjectConfig;

/// Prefix of the environment variables overriding configuration keys.
///
/// Nested keys are separated by a double underscore, e.g.
/// `TOKENSHIP_DEPLOY__CONFIRMATIONS=3`.
const ENV_PREFIX: &str = "TOKENSHIP_";

/// Variables read by the command line parser rather than the configuration.
const CLI_ENV_KEYS: &[&str] = &["verbosity", "config", "network", "confirmations"];

/// Load the configuration: built-in defaults, then `path` if it exists, then the
/// environment.
pub fn load(path: &Path) -> Result<ProjectConfig> {
    let mut figment = Figment::from(Serialized::defaults(ProjectConfig::default()));

    if path.exists() {
        tracing::debug!(path = %path.display(), "Loading configuration file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(CLI_ENV_KEYS).split("__"))
        .extract()
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

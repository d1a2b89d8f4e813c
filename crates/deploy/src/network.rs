//! Network profile registry.
//!
//! A [`NetworkRegistry`] maps network identifiers (`bsc_mainnet`, `polygon_testnet`, ...) to
//! the [`NetworkProfile`] used to reach them: JSON-RPC endpoint, chain id, signing
//! credentials and block explorer. The registry is built once at startup and only read
//! afterwards.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::DeployError;

/// The network used when none is selected explicitly.
pub const DEFAULT_NETWORK: &str = "bsc_mainnet";

/// Environment variable holding the Infura project id interpolated into Infura endpoints.
pub const INFURA_PROJECT_ID_ENV: &str = "INFURA_PROJECT_ID";

/// A secret value (private key or API key) that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Block explorer exposing an Etherscan-compatible verification API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// The API endpoint, e.g. `https://api.bscscan.com/api`.
    pub api_url: Url,
    /// The API key. Verification is impossible without one.
    pub api_key: Option<Secret>,
}

/// Everything needed to reach one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// The network identifier, e.g. `bsc_mainnet`.
    pub name: String,
    /// The JSON-RPC endpoint.
    pub rpc_url: Url,
    /// The chain id. When absent it is queried from the endpoint at submission time.
    pub chain_id: Option<u64>,
    /// Signing keys, in priority order. Empty means read-only access.
    #[serde(default)]
    pub accounts: Vec<Secret>,
    /// The verification explorer, if the network has one.
    #[serde(default)]
    pub explorer: Option<ExplorerConfig>,
}

impl NetworkProfile {
    /// Create a profile with no credentials and no explorer.
    pub fn new(name: impl Into<String>, rpc_url: Url) -> Self {
        Self {
            name: name.into(),
            rpc_url,
            chain_id: None,
            accounts: Vec::new(),
            explorer: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_account(mut self, key: impl Into<String>) -> Self {
        self.accounts.push(Secret::new(key));
        self
    }

    pub fn with_explorer(mut self, explorer: ExplorerConfig) -> Self {
        self.explorer = Some(explorer);
        self
    }

    /// The credential used to sign deployments.
    pub fn first_credential(&self) -> Option<&Secret> {
        self.accounts.first()
    }

    /// Whether transactions can be submitted to this network.
    pub fn can_submit(&self) -> bool {
        !self.accounts.is_empty()
    }

    /// The explorer, if it is usable for verification (i.e. has an API key).
    pub fn verification_explorer(&self) -> Option<&ExplorerConfig> {
        self.explorer.as_ref().filter(|e| e.api_key.is_some())
    }
}

/// A network declared in the project configuration file.
///
/// Secrets are never stored in the file itself; the file names the environment variables
/// that hold them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The JSON-RPC endpoint.
    pub url: String,
    /// The chain id, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Name of the environment variable holding the deployer private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    /// Etherscan-compatible API endpoint used for verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_api_url: Option<String>,
    /// Name of the environment variable holding the explorer API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_api_key_env: Option<String>,
}

impl NetworkConfig {
    /// Resolve this declaration into a profile, reading secrets through `env`.
    pub fn into_profile<F>(self, name: &str, env: F) -> anyhow::Result<NetworkProfile>
    where
        F: Fn(&str) -> Option<String>,
    {
        use anyhow::Context;

        let lookup = |var: &Option<String>| var.as_deref().and_then(|v| non_empty(env(v)));

        let rpc_url = Url::parse(&self.url)
            .with_context(|| format!("Invalid RPC URL for network `{}`: {}", name, self.url))?;

        let explorer = match &self.explorer_api_url {
            Some(api_url) => Some(ExplorerConfig {
                api_url: Url::parse(api_url).with_context(|| {
                    format!("Invalid explorer URL for network `{}`: {}", name, api_url)
                })?,
                api_key: lookup(&self.explorer_api_key_env).map(Secret::new),
            }),
            None => None,
        };

        Ok(NetworkProfile {
            name: name.to_string(),
            rpc_url,
            chain_id: self.chain_id,
            accounts: lookup(&self.private_key_env).map(Secret::new).into_iter().collect(),
            explorer,
        })
    }
}

/// Static description of a built-in network.
struct BuiltinNetwork {
    name: &'static str,
    /// Endpoint; `{INFURA_PROJECT_ID}` is interpolated.
    url: &'static str,
    chain_id: Option<u64>,
    private_key_env: Option<&'static str>,
    explorer: Option<(&'static str, &'static str)>,
}

const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";
const POLYGONSCAN_API_KEY_ENV: &str = "POLYGONSCAN_API_KEY";
const BSCSCAN_API_KEY_ENV: &str = "BSCSCAN_API_KEY";

const BUILTIN_NETWORKS: &[BuiltinNetwork] = &[
    BuiltinNetwork {
        name: "localhost",
        url: "http://127.0.0.1:8545",
        chain_id: None,
        private_key_env: None,
        explorer: None,
    },
    BuiltinNetwork {
        name: "coverage",
        url: "http://127.0.0.1:8555",
        chain_id: None,
        private_key_env: None,
        explorer: None,
    },
    BuiltinNetwork {
        name: "mainnet",
        url: "https://mainnet.infura.io/v3/{INFURA_PROJECT_ID}",
        chain_id: Some(1),
        private_key_env: Some("MAINNET_PRIVATE_KEY"),
        explorer: Some(("https://api.etherscan.io/api", ETHERSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "kovan",
        url: "https://kovan.infura.io/v3/{INFURA_PROJECT_ID}",
        chain_id: Some(42),
        private_key_env: Some("KOVAN_PRIVATE_KEY"),
        explorer: Some(("https://api-kovan.etherscan.io/api", ETHERSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "rinkeby",
        url: "https://rinkeby.infura.io/v3/{INFURA_PROJECT_ID}",
        chain_id: None,
        private_key_env: Some("RINKEBY_PRIVATE_KEY"),
        explorer: Some(("https://api-rinkeby.etherscan.io/api", ETHERSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "polygon_mainnet",
        url: "https://rpc-mainnet.maticvigil.com/",
        chain_id: None,
        private_key_env: Some("POLYGON_MAINNET_PRIVATE_KEY"),
        explorer: Some(("https://api.polygonscan.com/api", POLYGONSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "polygon_testnet",
        url: "https://matic-testnet-archive-rpc.bwarelabs.com",
        chain_id: Some(80001),
        private_key_env: Some("POLYGON_TESTNET_PRIVATE_KEY"),
        explorer: Some(("https://api-testnet.polygonscan.com/api", POLYGONSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "bsc_mainnet",
        url: "https://bsc-dataseed.binance.org/",
        chain_id: Some(56),
        private_key_env: Some("BSC_MAINNET_PRIVATE_KEY"),
        explorer: Some(("https://api.bscscan.com/api", BSCSCAN_API_KEY_ENV)),
    },
    BuiltinNetwork {
        name: "bsc_testnet",
        url: "https://data-seed-prebsc-1-s1.binance.org:8545",
        chain_id: Some(97),
        private_key_env: Some("BSC_TESTNET_PRIVATE_KEY"),
        explorer: Some(("https://api-testnet.bscscan.com/api", BSCSCAN_API_KEY_ENV)),
    },
];

/// Read-only lookup table of network profiles.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    profiles: BTreeMap<String, NetworkProfile>,
}

impl NetworkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the built-in network table, reading credentials from the process environment.
    pub fn from_env() -> Self {
        Self::builtin(|key| std::env::var(key).ok())
    }

    /// Build the built-in network table, reading credentials through `env`.
    ///
    /// A missing or empty private key yields a profile without credentials rather than an
    /// error: the network stays usable for reads and fails only when a deployment is
    /// attempted.
    pub fn builtin<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let infura_id = env(INFURA_PROJECT_ID_ENV).unwrap_or_default();
        let mut registry = Self::new();

        for network in BUILTIN_NETWORKS {
            let url = network.url.replace("{INFURA_PROJECT_ID}", &infura_id);
            let rpc_url = match Url::parse(&url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(
                        network = network.name,
                        url = %url,
                        error = %e,
                        "Skipping network with invalid RPC URL"
                    );
                    continue;
                }
            };

            let explorer = network.explorer.and_then(|(api_url, key_env)| {
                Url::parse(api_url).ok().map(|api_url| ExplorerConfig {
                    api_url,
                    api_key: non_empty(env(key_env)).map(Secret::new),
                })
            });

            let accounts = network
                .private_key_env
                .and_then(|key_env| non_empty(env(key_env)))
                .map(Secret::new)
                .into_iter()
                .collect();

            registry.insert(NetworkProfile {
                name: network.name.to_string(),
                rpc_url,
                chain_id: network.chain_id,
                accounts,
                explorer,
            });
        }

        registry
    }

    /// Add or replace a profile, returning the one it replaced.
    pub fn insert(&mut self, profile: NetworkProfile) -> Option<NetworkProfile> {
        self.profiles.insert(profile.name.clone(), profile)
    }

    /// Look up a profile by identifier.
    pub fn resolve(&self, name: &str) -> Result<&NetworkProfile, DeployError> {
        self.profiles
            .get(name)
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }

    /// All known network identifiers, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// All profiles, sorted by identifier.
    pub fn profiles(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

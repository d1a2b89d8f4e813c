//! Contract compilation.
//!
//! The pipeline only needs a [`Compiler`] that turns the project sources into a
//! [`CompiledContract`]. [`SolcCompiler`] does so by driving `solc --standard-json`.

mod solc;
mod sources;

use std::{future::Future, path::PathBuf};

use alloy_core::primitives::Bytes;
use serde::{Deserialize, Serialize};

pub use solc::{SolcCompiler, parse_solc_version};
pub use sources::{SourceSet, parse_imports};

/// Default solc release used for compilation and verification.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.6";

/// Default contract deployed by the pipeline.
pub const DEFAULT_CONTRACT: &str = "Token";

/// Optimizer settings, serialized exactly as solc expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: 1,
        }
    }
}

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Required solc version (e.g. `0.8.6`). Compilation fails if the binary differs.
    pub version: String,
    /// Optimizer settings.
    pub optimizer: OptimizerSettings,
    /// Target EVM version. Left to solc's default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<String>,
    /// Path to the solc binary.
    pub solc: PathBuf,
    /// Directory containing the project's Solidity sources, relative to the project root.
    pub sources: PathBuf,
    /// Directories searched for non-relative imports (e.g. `node_modules`).
    pub include_paths: Vec<PathBuf>,
    /// Name of the contract to deploy, either `Name` or `path/to/File.sol:Name`.
    pub contract: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: DEFAULT_SOLC_VERSION.to_string(),
            optimizer: OptimizerSettings::default(),
            evm_version: None,
            solc: PathBuf::from("solc"),
            sources: PathBuf::from("contracts"),
            include_paths: vec![PathBuf::from("node_modules")],
            contract: DEFAULT_CONTRACT.to_string(),
        }
    }
}

/// A source file entry of the standard-JSON input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    pub content: String,
}

/// The `settings` object of the standard-JSON input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardJsonSettings {
    pub optimizer: OptimizerSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<String>,
    pub output_selection: serde_json::Value,
}

/// The solc standard-JSON compiler input.
///
/// The same document is submitted to the verification service, so that the explorer
/// compiles exactly what was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardJsonInput {
    pub language: String,
    pub sources: std::collections::BTreeMap<String, SourceContent>,
    pub settings: StandardJsonSettings,
}

impl StandardJsonInput {
    /// Build the input for a set of sources.
    pub fn new(sources: &SourceSet, settings: &CompilerSettings) -> Self {
        Self {
            language: "Solidity".to_string(),
            sources: sources
                .iter()
                .map(|(unit, content)| {
                    (
                        unit.to_string(),
                        SourceContent {
                            content: content.to_string(),
                        },
                    )
                })
                .collect(),
            settings: StandardJsonSettings {
                optimizer: settings.optimizer,
                evm_version: settings.evm_version.clone(),
                output_selection: serde_json::json!({
                    "*": { "*": ["abi", "evm.bytecode.object", "metadata"] }
                }),
            },
        }
    }
}

/// The output of a successful compilation for the contract being deployed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    /// The contract name, e.g. `Token`.
    pub name: String,
    /// The fully qualified name, e.g. `contracts/Token.sol:Token`.
    pub qualified_name: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    /// The contract ABI as emitted by solc.
    pub abi: serde_json::Value,
    /// The input the contract was compiled from.
    pub input: StandardJsonInput,
    /// Full compiler version, e.g. `v0.8.6+commit.11564f7e`.
    pub compiler_version: String,
}

impl CompiledContract {
    /// The optimizer settings this contract was compiled with.
    pub fn optimizer(&self) -> OptimizerSettings {
        self.input.settings.optimizer
    }
}

/// Errors raised while compiling the project.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("solc binary not found at `{}`", .0.display())]
    SolcNotFound(PathBuf),

    #[error("solc version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("failed to read `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no Solidity sources found in `{}`", .0.display())]
    NoSources(PathBuf),

    #[error("cannot resolve import `{import}` from `{from}`")]
    UnresolvedImport { import: String, from: String },

    #[error("solc exited with {code:?}: {stderr}")]
    SolcFailed { code: Option<i32>, stderr: String },

    #[error("invalid solc output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("solc reported errors:\n{}", .0.join("\n"))]
    Diagnostics(Vec<String>),

    #[error("contract `{0}` not found in compiler output")]
    ContractNotFound(String),

    #[error("contract name `{name}` is ambiguous: {}", .candidates.join(", "))]
    AmbiguousContract {
        name: String,
        candidates: Vec<String>,
    },

    #[error("contract `{0}` has no creation bytecode (abstract contract or interface?)")]
    EmptyBytecode(String),

    #[error("contract `{0}` requires library linking, which is not supported")]
    UnlinkedLibraries(String),

    #[error("contract `{name}` has malformed bytecode: {reason}")]
    InvalidBytecode { name: String, reason: String },

    #[error("cannot parse solc version from `{0}`")]
    UnknownVersion(String),
}

/// Turns the project sources into deployable bytecode.
pub trait Compiler: Send + Sync {
    /// Compile the project and return the contract to deploy.
    fn compile(&self) -> impl Future<Output = Result<CompiledContract, CompileError>> + Send;
}

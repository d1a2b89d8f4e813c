//! `solc --standard-json` driver.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    process::Stdio,
};

use alloy_core::primitives::Bytes;
use serde::Deserialize;
use tokio::{io::AsyncWriteExt, process::Command};

use super::{CompileError, CompiledContract, Compiler, CompilerSettings, SourceSet, StandardJsonInput};

/// Compiles the project with a local solc binary.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    root: PathBuf,
    settings: CompilerSettings,
}

impl SolcCompiler {
    /// Create a compiler for the project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, settings: CompilerSettings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    /// Query the solc binary for its version, returning `(short, long)`
    /// e.g. `("0.8.6", "v0.8.6+commit.11564f7e")`.
    pub async fn version(&self) -> Result<(String, String), CompileError> {
        let output = Command::new(&self.settings.solc)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(CompileError::SolcFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_solc_version(&stdout).ok_or_else(|| CompileError::UnknownVersion(stdout.trim().to_string()))
    }

    async fn run_standard_json(&self, input: &StandardJsonInput) -> Result<String, CompileError> {
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.settings.solc)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("solc stdin is not available"))?;
        stdin.write_all(&payload).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CompileError::SolcFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn_error(&self, error: std::io::Error) -> CompileError {
        if error.kind() == std::io::ErrorKind::NotFound {
            CompileError::SolcNotFound(self.settings.solc.clone())
        } else {
            CompileError::Io(error)
        }
    }
}

impl Compiler for SolcCompiler {
    async fn compile(&self) -> Result<CompiledContract, CompileError> {
        let (found, long_version) = self.version().await?;
        if found != self.settings.version {
            return Err(CompileError::VersionMismatch {
                expected: self.settings.version.clone(),
                found,
            });
        }

        let sources = SourceSet::collect(
            &self.root,
            &self.settings.sources,
            &self.settings.include_paths,
        )?;
        tracing::debug!(
            sources = sources.len(),
            version = %long_version,
            optimizer = self.settings.optimizer.enabled,
            runs = self.settings.optimizer.runs,
            "Compiling contracts"
        );

        let input = StandardJsonInput::new(&sources, &self.settings);
        let output = self.run_standard_json(&input).await?;

        extract_contract(&output, &self.settings.contract, input, long_version)
    }
}

/// Parse the output of `solc --version`.
///
/// Returns the short version (`0.8.6`) and the long, explorer-style version
/// (`v0.8.6+commit.11564f7e`), dropping the platform suffix.
pub fn parse_solc_version(output: &str) -> Option<(String, String)> {
    let full = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))?
        .trim();

    let (short, build) = full.split_once('+')?;
    let commit: Vec<&str> = build.split('.').take(2).collect();
    if commit.len() != 2 || commit[0] != "commit" {
        return None;
    }

    Some((short.to_string(), format!("v{short}+{}", commit.join("."))))
}

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    errors: Vec<Diagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Diagnostic {
    severity: String,
    message: String,
    formatted_message: Option<String>,
}

impl Diagnostic {
    fn text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message).trim_end()
    }
}

#[derive(Debug, Deserialize)]
struct ContractOutput {
    #[serde(default)]
    abi: serde_json::Value,
    evm: EvmOutput,
}

#[derive(Debug, Deserialize)]
struct EvmOutput {
    bytecode: BytecodeOutput,
}

#[derive(Debug, Deserialize)]
struct BytecodeOutput {
    object: String,
}

/// Pick the requested contract out of solc's standard-JSON output.
///
/// `contract` is either a bare name or a fully qualified `unit:Name`.
pub(crate) fn extract_contract(
    output: &str,
    contract: &str,
    input: StandardJsonInput,
    compiler_version: String,
) -> Result<CompiledContract, CompileError> {
    let output: StandardJsonOutput = serde_json::from_str(output)?;

    let errors: Vec<String> = output
        .errors
        .iter()
        .filter(|d| d.severity == "error")
        .map(|d| d.text().to_string())
        .collect();
    if !errors.is_empty() {
        return Err(CompileError::Diagnostics(errors));
    }
    for warning in output.errors.iter().filter(|d| d.severity != "error") {
        tracing::warn!(severity = %warning.severity, "{}", warning.text());
    }

    let (wanted_unit, wanted_name) = match contract.rsplit_once(':') {
        Some((unit, name)) => (Some(unit), name),
        None => (None, contract),
    };

    let mut matches: Vec<(&String, &ContractOutput)> = output
        .contracts
        .iter()
        .filter(|(unit, _)| wanted_unit.is_none_or(|wanted| wanted == unit.as_str()))
        .filter_map(|(unit, contracts)| contracts.get(wanted_name).map(|c| (unit, c)))
        .collect();

    let (unit, compiled) = match matches.len() {
        0 => return Err(CompileError::ContractNotFound(contract.to_string())),
        1 => matches.remove(0),
        _ => {
            return Err(CompileError::AmbiguousContract {
                name: contract.to_string(),
                candidates: matches
                    .iter()
                    .map(|(unit, _)| format!("{unit}:{wanted_name}"))
                    .collect(),
            });
        }
    };

    let object = compiled.evm.bytecode.object.trim_start_matches("0x");
    if object.is_empty() {
        return Err(CompileError::EmptyBytecode(wanted_name.to_string()));
    }
    if object.contains("__$") {
        return Err(CompileError::UnlinkedLibraries(wanted_name.to_string()));
    }
    let bytecode = hex::decode(object).map_err(|e| CompileError::InvalidBytecode {
        name: wanted_name.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CompiledContract {
        name: wanted_name.to_string(),
        qualified_name: format!("{unit}:{wanted_name}"),
        bytecode: Bytes::from(bytecode),
        abi: compiled.abi.clone(),
        input,
        compiler_version,
    })
}

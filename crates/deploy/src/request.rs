//! Deployment requests and constructor argument encoding.

use alloy_core::{primitives::Address, sol_types::SolValue};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The caller-supplied parameters of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    pub fee: Address,
}

impl DeploymentRequest {
    pub fn new(
        owner: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        fee: Address,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            symbol: symbol.into(),
            fee,
        }
    }

    /// Project the request onto the contract's constructor parameters.
    pub fn constructor_arguments(&self) -> ConstructorArguments {
        ConstructorArguments {
            owner: self.owner,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            fee: self.fee,
        }
    }
}

/// Arguments of `constructor(address owner, string name, string symbol, address fee)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorArguments {
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    pub fee: Address,
}

impl ConstructorArguments {
    /// `abi.encode(owner, name, symbol, fee)`, as appended to the creation bytecode.
    pub fn abi_encode(&self) -> Vec<u8> {
        (self.owner, self.name.clone(), self.symbol.clone(), self.fee).abi_encode_params()
    }

    /// The creation payload: bytecode followed by the encoded arguments.
    pub fn init_code(&self, bytecode: &[u8]) -> Vec<u8> {
        let mut code = bytecode.to_vec();
        code.extend(self.abi_encode());
        code
    }
}

impl From<&DeploymentRequest> for ConstructorArguments {
    fn from(request: &DeploymentRequest) -> Self {
        request.constructor_arguments()
    }
}

/// Parse a `0x`-prefixed, 40 hex digit address.
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(addr: &str) -> Result<Address> {
    if !addr.starts_with("0x") || addr.len() != 42 {
        anyhow::bail!(
            "Invalid address format: expected 0x-prefixed 40 hex chars, got '{}'",
            addr
        );
    }

    let digits = &addr[2..];
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid address: contains non-hex characters: '{}'", addr);
    }

    let mixed_case = digits.chars().any(|c| c.is_ascii_uppercase())
        && digits.chars().any(|c| c.is_ascii_lowercase());
    if mixed_case {
        return Address::parse_checksummed(addr, None)
            .map_err(|_| anyhow::anyhow!("Invalid address: bad EIP-55 checksum: '{}'", addr));
    }

    addr.parse()
        .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", addr, e))
}

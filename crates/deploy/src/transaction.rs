//! Deployment transaction signing.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_network::{TxSignerSync, eip2718::Encodable2718};
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;

use crate::network::Secret;

/// A legacy contract-creation transaction carrying `init_code`.
///
/// Signing applies EIP-155 replay protection when `chain_id` is set.
pub fn creation_transaction(
    init_code: Bytes,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    chain_id: Option<u64>,
) -> TxLegacy {
    TxLegacy {
        chain_id,
        nonce,
        gas_price,
        gas_limit,
        to: TxKind::Create,
        value: U256::ZERO,
        input: init_code,
    }
}

/// A signed transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// EIP-2718 encoding, as accepted by `eth_sendRawTransaction`.
    pub raw: Bytes,
    pub hash: B256,
    pub from: Address,
}

/// A signing key loaded from a network credential.
#[derive(Clone)]
pub struct DeployerKey {
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for DeployerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl DeployerKey {
    /// Parse a hex private key, with or without the `0x` prefix.
    pub fn parse(secret: &Secret) -> anyhow::Result<Self> {
        let bytes = hex::decode(secret.expose().trim().trim_start_matches("0x"))
            .context("Private key is not valid hex")?;
        let signer = PrivateKeySigner::from_slice(&bytes)
            .context("Private key is not a valid secp256k1 scalar")?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign `tx`, producing its raw encoding and hash.
    pub fn sign(&self, mut tx: TxLegacy) -> anyhow::Result<SignedTransaction> {
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .context("Failed to sign transaction")?;

        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
            from: self.address(),
        })
    }
}

//! Fresh wallet generation.

use alloy_core::primitives::Address;
use alloy_signer_local::{
    MnemonicBuilder,
    coins_bip39::{English, Entropy, Mnemonic},
};
use anyhow::{Context, Result};
use rand::Rng;

use crate::network::Secret;

/// Derivation path of the first Ethereum account.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Entropy size of a 12-word mnemonic.
const ENTROPY_BYTES: usize = 16;

/// A newly generated account.
#[derive(Debug, Clone)]
pub struct GeneratedWallet {
    pub private_key: Secret,
    pub address: Address,
    pub mnemonic: Secret,
}

/// Generate a 12-word English mnemonic from OS randomness and derive its first account.
pub fn generate_wallet() -> Result<GeneratedWallet> {
    let mut entropy = [0u8; ENTROPY_BYTES];
    rand::rng().fill(&mut entropy);
    wallet_from_entropy(&entropy)
}

/// Derive a wallet from BIP-39 entropy.
pub fn wallet_from_entropy(entropy: &[u8; ENTROPY_BYTES]) -> Result<GeneratedWallet> {
    let phrase = mnemonic_from_entropy(entropy);

    let signer = MnemonicBuilder::<English>::default()
        .phrase(phrase.as_str())
        .derivation_path(DERIVATION_PATH)
        .context("Invalid derivation path")?
        .build()
        .context("Failed to derive account from mnemonic")?;

    let private_key = format!("0x{}", hex::encode(signer.credential().to_bytes()));
    tracing::debug!(address = %signer.address(), "Generated wallet");

    Ok(GeneratedWallet {
        private_key: Secret::new(private_key),
        address: signer.address(),
        mnemonic: Secret::new(phrase),
    })
}

/// The English BIP-39 phrase encoding `entropy`.
fn mnemonic_from_entropy(entropy: &[u8; ENTROPY_BYTES]) -> String {
    Mnemonic::<English>::new_from_entropy(Entropy::from(*entropy)).to_phrase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_vectors() {
        assert_eq!(
            mnemonic_from_entropy(&[0u8; 16]),
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        );
        assert_eq!(
            mnemonic_from_entropy(&[0x7f; 16]),
            "legal winner thank year wave sausage worth useful legal winner thank yellow"
        );
        assert_eq!(
            mnemonic_from_entropy(&[0xff; 16]),
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong"
        );
    }

    #[test]
    fn test_wallet_from_known_entropy() {
        let wallet = wallet_from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(
            wallet.address,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(wallet.private_key.expose().len(), 66);
    }

    #[test]
    fn test_generate_wallet_is_random() {
        let a = generate_wallet().unwrap();
        let b = generate_wallet().unwrap();

        assert_ne!(a.address, b.address);
        assert_eq!(a.mnemonic.expose().split_whitespace().count(), 12);

        let rederived = MnemonicBuilder::<English>::default()
            .phrase(a.mnemonic.expose())
            .build()
            .unwrap();
        assert_eq!(rederived.address(), a.address);
    }
}

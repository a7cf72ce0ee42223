//! Wallet identity derived from enclave key material

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::keypair::keypair_from_seed;
use solana_sdk::signer::Signer;

use crate::error::{Error, Result};

/// Ed25519 seed length expected from the key service, in bytes
const SEED_LEN: usize = 32;

/// Wallet identity held for the lifetime of the process
///
/// The secret keypair never leaves this struct; callers get the public
/// address and sign through a borrowed keypair reference.
#[derive(Debug)]
pub struct WalletIdentity {
    keypair: Keypair,
}

impl WalletIdentity {
    /// Build the identity from 0x-prefixed hex seed material
    pub fn from_enclave_seed(key_material: &str) -> Result<Self> {
        let hex_str = key_material.strip_prefix("0x").unwrap_or(key_material);

        let seed = hex::decode(hex_str)
            .map_err(|e| Error::InvalidKeyMaterial(format!("not hex: {}", e)))?;

        if seed.len() != SEED_LEN {
            return Err(Error::InvalidKeyMaterial(format!(
                "expected {} byte seed, got {}",
                SEED_LEN,
                seed.len()
            )));
        }

        let keypair = keypair_from_seed(&seed)
            .map_err(|e| Error::InvalidKeyMaterial(format!("seed rejected: {}", e)))?;

        Ok(Self { keypair })
    }

    /// Public address of the wallet
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Signing keypair, for transfer submission
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = format!("0x{}", "11".repeat(32));
        let a = WalletIdentity::from_enclave_seed(&seed).unwrap();
        let b = WalletIdentity::from_enclave_seed(&seed).unwrap();
        assert_eq!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn test_prefix_is_optional() {
        let bare = "22".repeat(32);
        let a = WalletIdentity::from_enclave_seed(&bare).unwrap();
        let b = WalletIdentity::from_enclave_seed(&format!("0x{}", bare)).unwrap();
        assert_eq!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn test_rejects_short_seed() {
        let err = WalletIdentity::from_enclave_seed("0xdeadbeef").unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial(_)));
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn test_rejects_non_hex() {
        assert!(WalletIdentity::from_enclave_seed("0xzz").is_err());
    }
}

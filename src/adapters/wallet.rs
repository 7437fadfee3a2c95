//! Wallet keypair loading

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::error::{RedeemerError, Result};

/// Decode a base58-encoded 64-byte secret key
pub fn load_keypair(secret_base58: &str) -> Result<Keypair> {
    let bytes = bs58::decode(secret_base58.trim())
        .into_vec()
        .map_err(|e| RedeemerError::Wallet(format!("invalid base58 private key: {}", e)))?;

    if bytes.len() != 64 {
        return Err(RedeemerError::Wallet(format!(
            "private key must be 64 bytes, got {}",
            bytes.len()
        )));
    }

    #[allow(deprecated)]
    let keypair = Keypair::from_bytes(&bytes)
        .map_err(|e| RedeemerError::Wallet(format!("invalid private key: {}", e)))?;
    Ok(keypair)
}

/// Check that a configured wallet address matches the keypair
pub fn verify_address(keypair: &Keypair, address: &str) -> Result<Pubkey> {
    let pubkey = keypair.pubkey();
    if !address.is_empty() && pubkey.to_string() != address {
        return Err(RedeemerError::Wallet(format!(
            "wallet address {} does not match private key ({})",
            address, pubkey
        )));
    }
    Ok(pubkey)
}

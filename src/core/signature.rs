// ECDSA over secp256k1: signing and verification of hex digests

use crate::error::{LedgerError, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

/// Decode a hex digest into a signable message
fn digest_message(digest_hex: &str) -> Result<Message> {
    let digest = hex::decode(digest_hex)
        .map_err(|e| LedgerError::Crypto(format!("Invalid digest hex: {}", e)))?;
    Message::from_digest_slice(&digest)
        .map_err(|e| LedgerError::Crypto(format!("Invalid digest: {}", e)))
}

/// Sign a 32-byte hex digest, returning the DER signature as hex
pub fn sign_digest(secret_key: &SecretKey, digest_hex: &str) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let message = digest_message(digest_hex)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_der()))
}

/// Verify a hex DER signature over a hex digest against a hex public key.
///
/// Never fails: malformed keys, digests or signatures simply do not verify.
pub fn verify_signature(public_key_hex: &str, digest_hex: &str, signature_hex: &str) -> bool {
    match try_verify(public_key_hex, digest_hex, signature_hex) {
        Ok(valid) => valid,
        Err(e) => {
            log::debug!("Signature check failed to parse input: {}", e);
            false
        }
    }
}

fn try_verify(public_key_hex: &str, digest_hex: &str, signature_hex: &str) -> Result<bool> {
    let secp = Secp256k1::verification_only();

    let key_bytes = hex::decode(public_key_hex)
        .map_err(|e| LedgerError::Crypto(format!("Invalid public key hex: {}", e)))?;
    let public_key = PublicKey::from_slice(&key_bytes)
        .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))?;

    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| LedgerError::Crypto(format!("Invalid signature hex: {}", e)))?;
    let signature = Signature::from_der(&sig_bytes)
        .map_err(|e| LedgerError::Crypto(format!("Invalid signature: {}", e)))?;

    let message = digest_message(digest_hex)?;

    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

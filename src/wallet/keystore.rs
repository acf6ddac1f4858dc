// Key management

use crate::core::sign_digest;
use crate::error::{LedgerError, Result};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk key file
#[derive(Serialize, Deserialize)]
struct KeyFile {
    secret_key: String,
    address: String,
}

/// Key pair
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = secret_key.public_key(&secp);

        Self {
            secret_key,
            public_key,
        }
    }

    /// Create from a hex-encoded secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| LedgerError::Crypto(format!("Invalid secret key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid secret key: {}", e)))?;
        let public_key = secret_key.public_key(&Secp256k1::new());

        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Compressed public key, hex. This is the wallet's address on the ledger.
    pub fn address(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a hex digest, DER hex
    pub fn sign(&self, digest_hex: &str) -> Result<String> {
        sign_digest(&self.secret_key, digest_hex)
    }

    /// Save key pair to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = KeyFile {
            secret_key: hex::encode(self.secret_key.secret_bytes()),
            address: self.address(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(path.as_ref(), json)?;

        log::info!("Saved key for {} to {}", file.address, path.as_ref().display());
        Ok(())
    }

    /// Load key pair from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let file: KeyFile = serde_json::from_str(&json)?;
        let keypair = Self::from_secret_hex(&file.secret_key)?;

        if keypair.address() != file.address {
            return Err(LedgerError::Crypto(format!(
                "Key file address {} does not match its secret key",
                file.address
            )));
        }

        Ok(keypair)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

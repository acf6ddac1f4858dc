// Wallet and key management

mod account;
mod keystore;

pub use account::Wallet;
pub use keystore::KeyPair;

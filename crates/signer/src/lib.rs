//! Key management and signing for Tessera timestamp documents.
//!
//! This crate provides:
//! - Ed25519 key generation and a text encoding for private keys
//! - The [`CryptoService`] signing capability used by the timestamp service
//! - An optional on-disk key directory so keys outlive the process

pub mod crypto;
pub mod error;
pub mod key;
pub mod keydir;

pub use crypto::{CryptoService, Ed25519Service};
pub use error::{SignerError, SignerResult};
pub use key::{KeyAlgorithm, KeyPair, PublicKey, SecretKey, Signature};
pub use keydir::KeyDir;

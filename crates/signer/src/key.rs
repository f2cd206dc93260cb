//! Key types and operations.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Supported signing algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Ed25519,
}

impl KeyAlgorithm {
    /// Name stored alongside public keys and used as the signature method.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = SignerError;

    fn from_str(s: &str) -> SignerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            other => Err(SignerError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secret (private) key for signing.
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    /// Generate a new random secret key.
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            inner: SigningKey::generate(&mut rng),
        }
    }

    /// Parse the text encoding: `key_id:base64(secret || public)`.
    ///
    /// The key id must match the embedded public key.
    pub fn decode(s: &str) -> SignerResult<Self> {
        let (key_id, b64) = s.trim().split_once(':').ok_or_else(|| {
            SignerError::KeyParsing("expected 'key_id:base64' format".to_string())
        })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| SignerError::KeyParsing(format!("invalid base64: {e}")))?;

        if bytes.len() != 64 {
            return Err(SignerError::KeyParsing(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let secret_bytes: [u8; 32] = bytes[..32]
            .try_into()
            .map_err(|_| SignerError::KeyParsing("invalid secret key bytes".to_string()))?;

        let key = Self {
            inner: SigningKey::from_bytes(&secret_bytes),
        };

        if key.inner.verifying_key().as_bytes()[..] != bytes[32..] {
            return Err(SignerError::KeyParsing(
                "public key does not match secret key".to_string(),
            ));
        }
        if key.public_key().key_id() != key_id {
            return Err(SignerError::KeyParsing(format!(
                "key id {key_id} does not match key material"
            )));
        }

        Ok(key)
    }

    /// Encode as `key_id:base64(secret || public)`.
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.inner.as_bytes());
        bytes.extend_from_slice(self.inner.verifying_key().as_bytes());
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        format!("{}:{b64}", self.public_key().key_id())
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            algorithm: KeyAlgorithm::Ed25519,
            bytes: self.inner.verifying_key().to_bytes().to_vec(),
        }
    }

    /// Sign `payload`.
    pub fn sign(&self, payload: &[u8]) -> Signature {
        let sig = self.inner.sign(payload);
        Signature {
            key_id: self.public_key().key_id(),
            method: KeyAlgorithm::Ed25519,
            bytes: sig.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A public key together with its algorithm.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Rebuild a public key from its stored cipher name and bytes.
    pub fn from_parts(cipher: &str, bytes: &[u8]) -> SignerResult<Self> {
        let algorithm: KeyAlgorithm = cipher.parse()?;
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
                    SignerError::KeyParsing(format!("expected 32 bytes, got {}", bytes.len()))
                })?;
                VerifyingKey::from_bytes(&key_bytes)
                    .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
            }
        }
        Ok(Self {
            algorithm,
            bytes: bytes.to_vec(),
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex SHA-256 of the public key bytes.
    pub fn key_id(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Verify `signature` over `payload`.
    pub fn verify(&self, payload: &[u8], signature: &Signature) -> SignerResult<()> {
        if signature.method != self.algorithm {
            return Err(SignerError::InvalidSignature(format!(
                "signature method {} does not match key algorithm {}",
                signature.method, self.algorithm
            )));
        }

        let sig_array: [u8; 64] = signature.bytes.as_slice().try_into().map_err(|_| {
            SignerError::InvalidSignature(format!(
                "expected 64 bytes, got {}",
                signature.bytes.len()
            ))
        })?;
        let key_bytes: [u8; 32] = self
            .bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignerError::KeyParsing("invalid public key length".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;

        verifying_key
            .verify(payload, &ed25519_dalek::Signature::from_bytes(&sig_array))
            .map_err(|_| SignerError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}, {}...)", self.algorithm, &self.key_id()[..8])
    }
}

/// A key pair containing both secret and public keys.
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair for `algorithm`.
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let secret = SecretKey::generate();
                let public = secret.public_key();
                Self { secret, public }
            }
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}

/// A detached signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub key_id: String,
    pub method: KeyAlgorithm,
    pub bytes: Vec<u8>,
}

impl Signature {
    /// Signature bytes as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Rebuild a signature from its document fields.
    pub fn from_base64(key_id: &str, method: &str, sig: &str) -> SignerResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(sig)
            .map_err(|e| SignerError::InvalidSignature(format!("invalid base64: {e}")))?;
        Ok(Self {
            key_id: key_id.to_string(),
            method: method.parse()?,
            bytes,
        })
    }
}

//! The signing capability used by the timestamp service.

use crate::error::{SignerError, SignerResult};
use crate::key::{KeyAlgorithm, KeyPair, PublicKey, SecretKey, Signature};
use crate::keydir::KeyDir;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Key generation and signing.
///
/// Private keys never leave the service; callers hold only the public half
/// and name the key to sign with by passing it back.
pub trait CryptoService: Send + Sync {
    /// Generate a new key pair for `algorithm` and return its public half.
    fn create(&self, algorithm: &str) -> SignerResult<PublicKey>;

    /// Sign `payload` with the private key matching `key`.
    fn sign(&self, key: &PublicKey, payload: &[u8]) -> SignerResult<Signature>;

    /// Discard the private key matching `key`. Unknown keys are ignored.
    fn remove(&self, key: &PublicKey) -> SignerResult<()>;
}

/// Ed25519 signing service.
///
/// Keys are cached in memory. With a [`KeyDir`], new keys are also written to
/// disk and unknown keys are looked up there before failing.
#[derive(Default)]
pub struct Ed25519Service {
    keys: RwLock<HashMap<String, SecretKey>>,
    key_dir: Option<KeyDir>,
}

impl Ed25519Service {
    /// Create a service that keeps keys in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service backed by a key directory.
    pub fn with_key_dir(path: impl AsRef<Path>) -> SignerResult<Self> {
        Ok(Self {
            keys: RwLock::new(HashMap::new()),
            key_dir: Some(KeyDir::open(path)?),
        })
    }

    /// Import an existing private key. Returns its public half.
    pub fn add_key(&self, secret: SecretKey) -> PublicKey {
        let public = secret.public_key();
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(public.key_id(), secret);
        public
    }

    /// Whether the private key for `key` is available.
    pub fn has_key(&self, key: &PublicKey) -> bool {
        let key_id = key.key_id();
        if self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key_id)
        {
            return true;
        }
        matches!(
            self.key_dir.as_ref().map(|dir| dir.load(&key_id)),
            Some(Ok(Some(_)))
        )
    }

    fn sign_cached(&self, key_id: &str, payload: &[u8]) -> Option<Signature> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_id)
            .map(|secret| secret.sign(payload))
    }
}

impl CryptoService for Ed25519Service {
    fn create(&self, algorithm: &str) -> SignerResult<PublicKey> {
        let algorithm: KeyAlgorithm = algorithm.parse()?;
        let pair = KeyPair::generate(algorithm);

        if let Some(dir) = &self.key_dir {
            dir.store(&pair.secret)?;
        }

        let public = self.add_key(pair.secret);
        tracing::debug!(key_id = %public.key_id(), algorithm = %algorithm, "Key generated");
        Ok(public)
    }

    fn sign(&self, key: &PublicKey, payload: &[u8]) -> SignerResult<Signature> {
        if key.algorithm() != KeyAlgorithm::Ed25519 {
            return Err(SignerError::UnsupportedAlgorithm(key.algorithm().to_string()));
        }

        let key_id = key.key_id();
        if let Some(signature) = self.sign_cached(&key_id, payload) {
            return Ok(signature);
        }

        let secret = self
            .key_dir
            .as_ref()
            .map(|dir| dir.load(&key_id))
            .transpose()?
            .flatten()
            .ok_or_else(|| SignerError::KeyNotFound(key_id.clone()))?;

        let signature = secret.sign(payload);
        self.add_key(secret);
        Ok(signature)
    }

    fn remove(&self, key: &PublicKey) -> SignerResult<()> {
        let key_id = key.key_id();
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key_id);
        if let Some(dir) = &self.key_dir {
            dir.remove(&key_id)?;
        }
        tracing::debug!(key_id = %key_id, "Key discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_sign() {
        let service = Ed25519Service::new();
        let public = service.create("ed25519").unwrap();
        assert!(service.has_key(&public));

        let sig = service.sign(&public, b"payload").unwrap();
        assert_eq!(sig.key_id, public.key_id());
        assert_eq!(sig.method, KeyAlgorithm::Ed25519);
        public.verify(b"payload", &sig).unwrap();
    }

    #[test]
    fn test_create_rejects_unknown_algorithm() {
        let service = Ed25519Service::new();
        assert!(matches!(
            service.create("rsa-pss"),
            Err(SignerError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_sign_with_unknown_key() {
        let service = Ed25519Service::new();
        let stranger = SecretKey::generate().public_key();
        assert!(!service.has_key(&stranger));
        assert!(matches!(
            service.sign(&stranger, b"payload"),
            Err(SignerError::KeyNotFound(id)) if id == stranger.key_id()
        ));
    }

    #[test]
    fn test_key_dir_survives_restart() {
        let temp = tempfile::tempdir().unwrap();
        let public = {
            let service = Ed25519Service::with_key_dir(temp.path()).unwrap();
            service.create("ed25519").unwrap()
        };

        let restarted = Ed25519Service::with_key_dir(temp.path()).unwrap();
        assert!(restarted.has_key(&public));
        let sig = restarted.sign(&public, b"after restart").unwrap();
        public.verify(b"after restart", &sig).unwrap();
    }

    #[test]
    fn test_remove_discards_key_file() {
        let temp = tempfile::tempdir().unwrap();
        let service = Ed25519Service::with_key_dir(temp.path()).unwrap();
        let public = service.create("ed25519").unwrap();
        let path = temp.path().join(format!("{}.key", public.key_id()));
        assert!(path.exists());

        service.remove(&public).unwrap();
        assert!(!path.exists());
        assert!(!service.has_key(&public));
        assert!(matches!(
            service.sign(&public, b"payload"),
            Err(SignerError::KeyNotFound(_))
        ));

        // Removing twice is fine.
        service.remove(&public).unwrap();
    }

    #[test]
    fn test_add_key_imports_existing_secret() {
        let service = Ed25519Service::new();
        let secret = SecretKey::generate();
        let expected = secret.public_key();
        let public = service.add_key(secret);
        assert_eq!(public, expected);
        assert!(service.sign(&public, b"x").is_ok());
    }
}

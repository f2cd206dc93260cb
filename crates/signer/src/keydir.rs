//! On-disk private key directory.

use crate::error::{SignerError, SignerResult};
use crate::key::SecretKey;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A directory of private keys, one `<key_id>.key` file per key.
#[derive(Clone, Debug)]
pub struct KeyDir {
    path: PathBuf,
}

impl KeyDir {
    /// Open (and create if needed) a key directory.
    pub fn open(path: impl AsRef<Path>) -> SignerResult<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_path(&self, key_id: &str) -> SignerResult<PathBuf> {
        // Key ids are hex digests; anything else could escape the directory.
        if key_id.is_empty() || !key_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SignerError::KeyParsing(format!("invalid key id: {key_id}")));
        }
        Ok(self.path.join(format!("{key_id}.key")))
    }

    /// Write a new key file. Existing files are never overwritten.
    pub fn store(&self, key: &SecretKey) -> SignerResult<()> {
        let key_id = key.public_key().key_id();
        let path = self.key_path(&key_id)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path)?;
        file.write_all(key.encode().as_bytes())?;
        file.sync_all()?;

        tracing::debug!(key_id = %key_id, path = %path.display(), "Private key written");
        Ok(())
    }

    /// Delete a key file. Missing files are not an error.
    pub fn remove(&self, key_id: &str) -> SignerResult<()> {
        let path = self.key_path(key_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(key_id = %key_id, path = %path.display(), "Private key removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a key by id. Returns `None` when no file exists.
    pub fn load(&self, key_id: &str) -> SignerResult<Option<SecretKey>> {
        let path = self.key_path(key_id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let key = SecretKey::decode(&contents)?;
        if key.public_key().key_id() != key_id {
            return Err(SignerError::KeyParsing(format!(
                "{} holds a different key",
                path.display()
            )));
        }
        Ok(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let dir = KeyDir::open(temp.path().join("keys")).unwrap();

        let key = SecretKey::generate();
        let key_id = key.public_key().key_id();
        dir.store(&key).unwrap();

        let loaded = dir.load(&key_id).unwrap().unwrap();
        assert_eq!(loaded.public_key(), key.public_key());

        // Keys are write-once.
        assert!(matches!(dir.store(&key), Err(SignerError::Io(_))));
    }

    #[test]
    fn test_remove() {
        let temp = tempfile::tempdir().unwrap();
        let dir = KeyDir::open(temp.path()).unwrap();
        let key = SecretKey::generate();
        let key_id = key.public_key().key_id();
        dir.store(&key).unwrap();

        dir.remove(&key_id).unwrap();
        assert!(dir.load(&key_id).unwrap().is_none());
        dir.remove(&key_id).unwrap();
        assert!(dir.remove("../escape").is_err());
    }

    #[test]
    fn test_load_missing_and_invalid_ids() {
        let temp = tempfile::tempdir().unwrap();
        let dir = KeyDir::open(temp.path()).unwrap();
        assert!(dir.load(&"ab".repeat(32)).unwrap().is_none());
        assert!(dir.load("../etc/passwd").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let dir = KeyDir::open(temp.path()).unwrap();
        let key = SecretKey::generate();
        dir.store(&key).unwrap();

        let path = temp.path().join(format!("{}.key", key.public_key().key_id()));
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

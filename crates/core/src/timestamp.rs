//! Timestamp document codec.
//!
//! A timestamp document points at the current snapshot by length and hash and
//! carries an expiration instant. The server only decodes what it needs to
//! decide freshness; every other role is stored as opaque bytes.

use crate::hash::ContentHash;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Value of the `_type` field of a timestamp document.
pub const TIMESTAMP_TYPE: &str = "Timestamp";

/// Hash algorithm name used in [`FileMeta::hashes`].
pub const SHA256: &str = "sha256";

/// Length and hashes of a referenced metadata document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub length: u64,
    pub hashes: BTreeMap<String, String>,
}

impl FileMeta {
    /// Describe a document by its serialized bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hashes = BTreeMap::new();
        hashes.insert(SHA256.to_string(), ContentHash::compute(data).to_hex());
        Self {
            length: data.len() as u64,
            hashes,
        }
    }

    /// The SHA-256 hash of the referenced document, if present and well formed.
    pub fn sha256(&self) -> Option<ContentHash> {
        self.hashes
            .get(SHA256)
            .and_then(|h| ContentHash::from_hex(h).ok())
    }

    /// Whether `data` matches this reference.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.length == data.len() as u64
            && self.sha256() == Some(ContentHash::compute(data))
    }
}

/// The signed portion of a timestamp document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub meta: BTreeMap<String, FileMeta>,
}

impl Timestamp {
    /// Build a timestamp that references the given snapshot bytes.
    pub fn new(version: u64, expires: OffsetDateTime, snapshot: &[u8]) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert(Role::Snapshot.to_string(), FileMeta::from_bytes(snapshot));
        Self {
            type_name: TIMESTAMP_TYPE.to_string(),
            version,
            expires,
            meta,
        }
    }

    /// Reference to the snapshot this timestamp covers.
    pub fn snapshot_meta(&self) -> Option<&FileMeta> {
        self.meta.get(Role::Snapshot.as_str())
    }

    /// Bytes covered by signatures.
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A signature over [`Timestamp::canonical_bytes`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSignature {
    #[serde(rename = "keyid")]
    pub key_id: String,
    pub method: String,
    /// Base64-encoded signature bytes.
    pub sig: String,
}

/// A timestamp document together with its signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTimestamp {
    pub signed: Timestamp,
    pub signatures: Vec<TimestampSignature>,
}

impl SignedTimestamp {
    /// Decode a stored timestamp document.
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        let ts: Self = serde_json::from_slice(data)?;
        if ts.signed.type_name != TIMESTAMP_TYPE {
            return Err(crate::Error::InvalidDocument(format!(
                "expected _type {TIMESTAMP_TYPE}, got {}",
                ts.signed.type_name
            )));
        }
        Ok(ts)
    }

    /// Encode for storage.
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// A timestamp is expired once its expiry is at or before `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.signed.expires <= now
    }
}

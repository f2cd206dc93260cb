//! Metadata role names.
//!
//! The store treats roles as opaque strings; delegated roles such as
//! `targets/releases` are valid role names. [`Role`] names the four
//! top-level roles the server itself needs to refer to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A top-level metadata role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    Targets,
    Snapshot,
    Timestamp,
}

impl Role {
    /// The role name used as the store key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Targets => "targets",
            Role::Snapshot => "snapshot",
            Role::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

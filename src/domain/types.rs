//! Core identifier types for domain entities.
//!
//! These newtype wrappers provide type safety for entity identifiers,
//! preventing accidental mixing of different ID types. All of them wrap the
//! SQLite rowid assigned on insert.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an email account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a folder belonging to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderId(pub i64);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FolderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a sending identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub i64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for IdentityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_display() {
        let id = AccountId(42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn folder_id_equality() {
        let id1 = FolderId::from(7);
        let id2 = FolderId(7);
        assert_eq!(id1, id2);
        assert_ne!(id1, FolderId(8));
    }

    #[test]
    fn identity_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(IdentityId::from(1));
        assert!(set.contains(&IdentityId(1)));
    }
}

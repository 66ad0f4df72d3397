//! Replication group identifier
//!
//! Each backend store owns exactly one replication group. The group id is
//! derived from the store's logical name so every peer hosting the same store
//! agrees on it without coordination.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one replication group (`<database>-<store>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Group id for the store `store` of database `database`
    pub fn for_store(database: &str, store: &str) -> Self {
        Self(format!("{}-{}", database, store))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_for_store() {
        let group = GroupId::for_store("hugegraph", "g");
        assert_eq!(group.as_str(), "hugegraph-g");
        assert_eq!(group.to_string(), "hugegraph-g");
        assert_eq!(group, GroupId::from("hugegraph-g"));
    }
}

//! Common types used across chado-tools

use serde::{Deserialize, Serialize};

/// Identifier of a supported CHADO schema revision (e.g. "1.2", "1.31").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SchemaVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Pagination parameters for list queries.
///
/// Offset-based: the query engine orders by the anchor table's primary key,
/// so fixed-size pages are stable across concurrent writes to other rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return
    pub limit: i64,

    /// Number of items to skip
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Pagination for a specific zero-indexed page with a given page size.
    pub fn page(page: i64, page_size: i64) -> Self {
        Self {
            limit: page_size,
            offset: page * page_size,
        }
    }

    /// Clamp the limit into `1..=max` and forbid negative offsets.
    pub fn clamped(self, max: i64) -> Self {
        Self {
            limit: self.limit.clamp(1, max),
            offset: self.offset.max(0),
        }
    }
}

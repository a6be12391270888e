//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.
//!
//! Documents are flattened before they are stored: every leaf (a scalar or
//! an array) is one entry keyed by its full path, e.g.
//! `orders/01J.../status`. A subtree is the key range `path/` .. `path0`
//! (`'0'` sorts right after `'/'`), so reads and overwrites of a subtree are
//! single range operations.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Document leaves, keyed by full path. Value is CBOR.
    pub const DOCUMENTS: &str = "documents";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::DOCUMENTS]
}

/// First key strictly inside the subtree at `path`.
#[must_use]
pub fn subtree_start(path: &str) -> String {
    format!("{path}/")
}

/// First key after the subtree at `path`.
#[must_use]
pub fn subtree_end(path: &str) -> String {
    format!("{path}0")
}

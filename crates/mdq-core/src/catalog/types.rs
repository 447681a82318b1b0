//! Types used by the catalog store.

use serde::{Deserialize, Serialize};

/// Catalog row identifier.
pub type EntryId = i64;

/// Durable record of one completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub source_ref: String,
    pub file_path: String,
    pub file_size: i64,
    pub completed_at: i64,
}

/// A completion about to be recorded (row id assigned by the database).
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub source_ref: String,
    pub file_path: String,
    pub file_size: i64,
}

/// Result of a lookup: the entry plus whether its file is still on disk.
///
/// A missing file means the entry is stale; dedup must treat it as a miss
/// instead of trusting the record blindly.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub entry: CatalogEntry,
    pub file_present: bool,
}

/// Filter for catalog listings.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Substring match against source_ref or file_path.
    pub contains: Option<String>,
}

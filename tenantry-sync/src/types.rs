use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A converted document as written to the destination collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub body: Value,
}

/// Counters of one pipeline since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Bulk writes sent to the destination collection.
    pub batches_written: u64,
    pub documents_written: u64,
    pub documents_deleted: u64,
    /// Events ignored because the pipeline was disabled or the event was on
    /// another collection.
    pub events_skipped: u64,
}

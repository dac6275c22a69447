use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tenant index name, an isolated namespace of collections like `"acme"`.
pub type IndexName = String;
/// Collection name inside a tenant index.
pub type CollectionName = String;
/// Document identifier inside a collection.
pub type DocumentId = String;

/// Field holding the audit block of a stored document.
pub const AUDIT_FIELD: &str = "_kuzzle_info";

/// A stored document: an identifier plus its JSON source.
///
/// An empty `id` means "not assigned yet"; the [`crate::pipe::DocumentGateway`]
/// assigns one after the before-write pipes had a chance to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "_source")]
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, source: Value) -> Self {
        Document {
            id: id.into(),
            source,
        }
    }

    /// Look up a field of the source by dotted path (`"engine.index"`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.source, path)
    }
}

pub(crate) fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Consistency requested for a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    /// Return as soon as the write is acknowledged.
    #[default]
    None,
    /// Return once the write is visible to `exists`/`search`.
    WaitFor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub refresh: Refresh,
}

impl WriteOptions {
    pub fn wait_for() -> Self {
        WriteOptions {
            refresh: Refresh::WaitFor,
        }
    }
}

/// Language of a search query handed to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
    #[default]
    Koncorde,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub size: usize,
    pub lang: QueryLanguage,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            size: 10,
            lang: QueryLanguage::Koncorde,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: usize,
    pub hits: Vec<Document>,
}

/// Per-document failure reported by a batched store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocFailure {
    pub id: DocumentId,
    pub reason: String,
    pub status: u16,
}

impl DocFailure {
    pub fn new(id: impl Into<DocumentId>, reason: impl Into<String>, status: u16) -> Self {
        DocFailure {
            id: id.into(),
            reason: reason.into(),
            status,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiGetResult {
    pub successes: Vec<Document>,
    /// Ids that could not be fetched (missing documents).
    pub errors: Vec<DocumentId>,
}

#[derive(Debug, Clone, Default)]
pub struct MultiDeleteResult {
    pub successes: Vec<DocumentId>,
    pub errors: Vec<DocFailure>,
}

/// Options of a bulk write (`m_write`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkWriteOptions {
    /// Any single failure rejects the whole batch; nothing is applied.
    pub strict: bool,
    /// Publish a change notification for every written document.
    pub notify: bool,
    pub refresh: Refresh,
}

impl Default for BulkWriteOptions {
    fn default() -> Self {
        BulkWriteOptions {
            strict: true,
            notify: false,
            refresh: Refresh::None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BulkWriteResult {
    pub successes: Vec<Document>,
    pub errors: Vec<DocFailure>,
}

/// Whether a replicated write creates or updates the destination document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

/// Audit block injected into documents written on behalf of the system.
///
/// Serializes to `{"creator": null, "createdAt": <ms>}` or
/// `{"updater": null, "updatedAt": <ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditInfo {
    Created {
        creator: Option<String>,
        #[serde(rename = "createdAt")]
        created_at: i64,
    },
    Updated {
        updater: Option<String>,
        #[serde(rename = "updatedAt")]
        updated_at: i64,
    },
}

impl AuditInfo {
    pub fn system(kind: WriteKind, at_ms: i64) -> Self {
        match kind {
            WriteKind::Create => AuditInfo::Created {
                creator: None,
                created_at: at_ms,
            },
            WriteKind::Update => AuditInfo::Updated {
                updater: None,
                updated_at: at_ms,
            },
        }
    }

    pub fn to_json(&self) -> Value {
        // Plain struct-like enum, serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Change notification published by stores for `notify` writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub index: IndexName,
    pub collection: CollectionName,
    pub id: DocumentId,
    pub kind: WriteKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_field_lookup_by_path() {
        let doc = Document::new("e1", json!({"engine": {"index": "acme", "group": "g1"}}));
        assert_eq!(doc.field("engine.index"), Some(&json!("acme")));
        assert_eq!(doc.field("engine.missing"), None);
        assert_eq!(doc.field("nope.index"), None);
    }

    #[test]
    fn test_document_serializes_with_underscore_keys() {
        let doc = Document::new("a1", json!({"group": "x"}));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"_id": "a1", "_source": {"group": "x"}}));
    }

    #[test]
    fn test_audit_info_shapes() {
        let created = AuditInfo::system(WriteKind::Create, 42).to_json();
        assert_eq!(created, json!({"creator": null, "createdAt": 42}));

        let updated = AuditInfo::system(WriteKind::Update, 43).to_json();
        assert_eq!(updated, json!({"updater": null, "updatedAt": 43}));
    }
}

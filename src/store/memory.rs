use super::DocumentStore;
use crate::error::{Result, TenantryError};
use crate::query::Filter;
use crate::types::{
    BulkWriteOptions, BulkWriteResult, ChangeNotification, DocFailure, Document, DocumentId,
    MultiDeleteResult, MultiGetResult, SearchOptions, SearchResult, WriteKind, WriteOptions,
};
use crate::utils::merge_json;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Default)]
struct CollectionData {
    mappings: Value,
    documents: BTreeMap<DocumentId, Value>,
}

#[derive(Default)]
struct IndexData {
    collections: HashMap<String, CollectionData>,
}

/// Call counters, used to observe how often remote operations happen.
#[derive(Default)]
struct CallCounters {
    index_create: AtomicUsize,
    document_create: AtomicUsize,
    m_get: AtomicUsize,
    m_write: AtomicUsize,
    m_delete: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub index_create: usize,
    pub document_create: usize,
    pub m_get: usize,
    pub m_write: usize,
    pub m_delete: usize,
}

/// In-memory [`DocumentStore`].
///
/// Writes are visible immediately, so every refresh policy behaves like
/// `WaitFor`. An optional per-call latency makes interleavings between
/// concurrent callers observable in tests.
pub struct MemoryStore {
    indexes: DashMap<String, IndexData>,
    latency: Option<Duration>,
    calls: CallCounters,
    notifications: broadcast::Sender<ChangeNotification>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(1024);
        Self {
            indexes: DashMap::new(),
            latency: None,
            calls: CallCounters::default(),
            notifications,
        }
    }

    /// Sleep for `latency` at the start of every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            index_create: self.calls.index_create.load(Ordering::SeqCst),
            document_create: self.calls.document_create.load(Ordering::SeqCst),
            m_get: self.calls.m_get.load(Ordering::SeqCst),
            m_write: self.calls.m_write.load(Ordering::SeqCst),
            m_delete: self.calls.m_delete.load(Ordering::SeqCst),
        }
    }

    /// Receive a notification for every document written with `notify`.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifications.subscribe()
    }

    pub fn document_count(&self, index: &str, collection: &str) -> usize {
        self.indexes
            .get(index)
            .and_then(|idx| idx.collections.get(collection).map(|c| c.documents.len()))
            .unwrap_or(0)
    }

    pub fn mappings(&self, index: &str, collection: &str) -> Option<Value> {
        self.indexes
            .get(index)
            .and_then(|idx| idx.collections.get(collection).map(|c| c.mappings.clone()))
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn with_collection<T>(
        &self,
        index: &str,
        collection: &str,
        f: impl FnOnce(&mut CollectionData) -> Result<T>,
    ) -> Result<T> {
        let mut idx = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| TenantryError::IndexNotFound(index.to_string()))?;
        let coll = idx.collections.get_mut(collection).ok_or_else(|| {
            TenantryError::CollectionNotFound {
                index: index.to_string(),
                collection: collection.to_string(),
            }
        })?;
        f(coll)
    }

    fn notify(&self, index: &str, collection: &str, id: &str, kind: WriteKind) {
        // No subscribers is not an error.
        let _ = self.notifications.send(ChangeNotification {
            index: index.to_string(),
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn require_object(id: &str, body: &Value) -> Result<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(TenantryError::InvalidDocument(format!(
            "Document \"{}\" body must be a JSON object",
            id
        )))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.pause().await;
        Ok(self.indexes.contains_key(index))
    }

    async fn index_create(&self, index: &str) -> Result<()> {
        self.pause().await;
        self.calls.index_create.fetch_add(1, Ordering::SeqCst);
        match self.indexes.entry(index.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TenantryError::IndexAlreadyExists(index.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(IndexData::default());
                Ok(())
            }
        }
    }

    async fn collection_exists(&self, index: &str, collection: &str) -> Result<bool> {
        self.pause().await;
        Ok(self
            .indexes
            .get(index)
            .map(|idx| idx.collections.contains_key(collection))
            .unwrap_or(false))
    }

    async fn collection_create(
        &self,
        index: &str,
        collection: &str,
        mappings: &Value,
    ) -> Result<()> {
        self.pause().await;
        let mut idx = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| TenantryError::IndexNotFound(index.to_string()))?;
        idx.collections
            .entry(collection.to_string())
            .or_default()
            .mappings = mappings.clone();
        Ok(())
    }

    async fn collection_delete(&self, index: &str, collection: &str) -> Result<()> {
        self.pause().await;
        let mut idx = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| TenantryError::IndexNotFound(index.to_string()))?;
        idx.collections
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| TenantryError::CollectionNotFound {
                index: index.to_string(),
                collection: collection.to_string(),
            })
    }

    async fn document_exists(&self, index: &str, collection: &str, id: &str) -> Result<bool> {
        self.pause().await;
        self.with_collection(index, collection, |coll| {
            Ok(coll.documents.contains_key(id))
        })
    }

    async fn document_get(
        &self,
        index: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>> {
        self.pause().await;
        self.with_collection(index, collection, |coll| {
            Ok(coll
                .documents
                .get(id)
                .map(|source| Document::new(id, source.clone())))
        })
    }

    async fn document_create(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        body: Value,
        _options: WriteOptions,
    ) -> Result<Document> {
        self.pause().await;
        self.calls.document_create.fetch_add(1, Ordering::SeqCst);
        require_object(id, &body)?;
        self.with_collection(index, collection, |coll| {
            if coll.documents.contains_key(id) {
                return Err(TenantryError::DocumentConflict {
                    index: index.to_string(),
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
            coll.documents.insert(id.to_string(), body.clone());
            Ok(Document::new(id, body))
        })
    }

    async fn document_update(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        changes: Value,
        _options: WriteOptions,
    ) -> Result<Document> {
        self.pause().await;
        require_object(id, &changes)?;
        self.with_collection(index, collection, |coll| {
            let source = coll.documents.get_mut(id).ok_or_else(|| {
                TenantryError::DocumentNotFound {
                    index: index.to_string(),
                    collection: collection.to_string(),
                    id: id.to_string(),
                }
            })?;
            merge_json(source, &changes);
            Ok(Document::new(id, source.clone()))
        })
    }

    async fn document_delete(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        _options: WriteOptions,
    ) -> Result<()> {
        self.pause().await;
        self.with_collection(index, collection, |coll| {
            coll.documents
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| TenantryError::DocumentNotFound {
                    index: index.to_string(),
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
        })
    }

    async fn search(
        &self,
        index: &str,
        collection: &str,
        filter: &Filter,
        options: SearchOptions,
    ) -> Result<SearchResult> {
        self.pause().await;
        self.with_collection(index, collection, |coll| {
            let matching: Vec<_> = coll
                .documents
                .iter()
                .filter(|(_, source)| filter.matches(source))
                .collect();
            Ok(SearchResult {
                total: matching.len(),
                hits: matching
                    .into_iter()
                    .take(options.size)
                    .map(|(id, source)| Document::new(id.clone(), source.clone()))
                    .collect(),
            })
        })
    }

    async fn m_get(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<MultiGetResult> {
        self.pause().await;
        self.calls.m_get.fetch_add(1, Ordering::SeqCst);
        self.with_collection(index, collection, |coll| {
            let mut result = MultiGetResult::default();
            for id in ids {
                match coll.documents.get(id) {
                    Some(source) => result
                        .successes
                        .push(Document::new(id.clone(), source.clone())),
                    None => result.errors.push(id.clone()),
                }
            }
            Ok(result)
        })
    }

    async fn m_delete(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
        _options: WriteOptions,
    ) -> Result<MultiDeleteResult> {
        self.pause().await;
        self.calls.m_delete.fetch_add(1, Ordering::SeqCst);
        self.with_collection(index, collection, |coll| {
            let mut result = MultiDeleteResult::default();
            for id in ids {
                if coll.documents.remove(id).is_some() {
                    result.successes.push(id.clone());
                } else {
                    result
                        .errors
                        .push(DocFailure::new(id.clone(), "Document not found", 404));
                }
            }
            Ok(result)
        })
    }

    async fn m_write(
        &self,
        index: &str,
        collection: &str,
        documents: Vec<Document>,
        options: BulkWriteOptions,
    ) -> Result<BulkWriteResult> {
        self.pause().await;
        self.calls.m_write.fetch_add(1, Ordering::SeqCst);

        let mut result = BulkWriteResult::default();
        let mut accepted = Vec::with_capacity(documents.len());
        for doc in documents {
            if doc.id.is_empty() {
                result
                    .errors
                    .push(DocFailure::new("", "Document id is required", 400));
            } else if !doc.source.is_object() {
                result.errors.push(DocFailure::new(
                    doc.id.clone(),
                    "Document body must be a JSON object",
                    400,
                ));
            } else {
                accepted.push(doc);
            }
        }

        if options.strict && !result.errors.is_empty() {
            return Err(TenantryError::BulkWrite {
                index: index.to_string(),
                collection: collection.to_string(),
                failures: result.errors,
            });
        }

        let written = self.with_collection(index, collection, |coll| {
            Ok(accepted
                .into_iter()
                .map(|doc| {
                    let kind = if coll.documents.contains_key(&doc.id) {
                        WriteKind::Update
                    } else {
                        WriteKind::Create
                    };
                    coll.documents.insert(doc.id.clone(), doc.source.clone());
                    (doc, kind)
                })
                .collect::<Vec<_>>())
        })?;

        for (doc, kind) in written {
            if options.notify {
                self.notify(index, collection, &doc.id, kind);
            }
            result.successes.push(doc);
        }
        Ok(result)
    }
}

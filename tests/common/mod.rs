#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenantry::engine::EngineContext;
use tenantry::{
    BulkWriteOptions, BulkWriteResult, Document, DocumentId, DocumentStore, EngineConfig,
    EngineHooks, EngineManager, Filter, LockConfig, MemoryLockProvider, MemoryStore,
    MultiDeleteResult, MultiGetResult, Provisioned, Result, SearchOptions, SearchResult,
    TenantryError, WriteOptions,
};

pub fn test_config() -> EngineConfig {
    EngineConfig {
        lock: LockConfig {
            lease_ttl: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        },
        ..EngineConfig::default()
    }
}

/// Hooks that record every call and can be told to fail.
#[derive(Default)]
pub struct RecordingHooks {
    pub calls: Mutex<Vec<String>>,
    pub fail_on_delete: AtomicBool,
    pub fail_on_create: AtomicBool,
    pub collections: Vec<String>,
}

impl RecordingHooks {
    pub fn new(collections: &[&str]) -> Self {
        Self {
            collections: collections.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EngineHooks for RecordingHooks {
    async fn init(&self, ctx: &EngineContext<'_>) -> Result<()> {
        self.record(format!("init:{}", ctx.plugin_name));
        Ok(())
    }

    async fn on_create(&self, index: &str, group: &str) -> Result<Provisioned> {
        self.record(format!("create:{}:{}", index, group));
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(TenantryError::Store("create hook failed".to_string()));
        }
        Ok(Provisioned::new(self.collections.clone()))
    }

    async fn on_update(&self, index: &str, group: &str) -> Result<Provisioned> {
        self.record(format!("update:{}:{}", index, group));
        Ok(Provisioned::new(self.collections.clone()))
    }

    async fn on_delete(&self, index: &str) -> Result<Provisioned> {
        self.record(format!("delete:{}", index));
        if self.fail_on_delete.load(Ordering::SeqCst) {
            return Err(TenantryError::Store("teardown failed".to_string()));
        }
        Ok(Provisioned::new(self.collections.clone()))
    }
}

/// Memory store whose index and document creation can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_index_create: AtomicBool,
    pub fail_document_create: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.inner.index_exists(index).await
    }

    async fn index_create(&self, index: &str) -> Result<()> {
        if self.fail_index_create.load(Ordering::SeqCst) {
            return Err(TenantryError::Store("index creation refused".to_string()));
        }
        self.inner.index_create(index).await
    }

    async fn collection_exists(&self, index: &str, collection: &str) -> Result<bool> {
        self.inner.collection_exists(index, collection).await
    }

    async fn collection_create(
        &self,
        index: &str,
        collection: &str,
        mappings: &Value,
    ) -> Result<()> {
        self.inner.collection_create(index, collection, mappings).await
    }

    async fn collection_delete(&self, index: &str, collection: &str) -> Result<()> {
        self.inner.collection_delete(index, collection).await
    }

    async fn document_exists(&self, index: &str, collection: &str, id: &str) -> Result<bool> {
        self.inner.document_exists(index, collection, id).await
    }

    async fn document_get(
        &self,
        index: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>> {
        self.inner.document_get(index, collection, id).await
    }

    async fn document_create(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        body: Value,
        options: WriteOptions,
    ) -> Result<Document> {
        if self.fail_document_create.load(Ordering::SeqCst) {
            return Err(TenantryError::Store("document creation refused".to_string()));
        }
        self.inner
            .document_create(index, collection, id, body, options)
            .await
    }

    async fn document_update(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        changes: Value,
        options: WriteOptions,
    ) -> Result<Document> {
        self.inner
            .document_update(index, collection, id, changes, options)
            .await
    }

    async fn document_delete(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        options: WriteOptions,
    ) -> Result<()> {
        self.inner
            .document_delete(index, collection, id, options)
            .await
    }

    async fn search(
        &self,
        index: &str,
        collection: &str,
        filter: &Filter,
        options: SearchOptions,
    ) -> Result<SearchResult> {
        self.inner.search(index, collection, filter, options).await
    }

    async fn m_get(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<MultiGetResult> {
        self.inner.m_get(index, collection, ids).await
    }

    async fn m_delete(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
        options: WriteOptions,
    ) -> Result<MultiDeleteResult> {
        self.inner.m_delete(index, collection, ids, options).await
    }

    async fn m_write(
        &self,
        index: &str,
        collection: &str,
        documents: Vec<Document>,
        options: BulkWriteOptions,
    ) -> Result<BulkWriteResult> {
        self.inner.m_write(index, collection, documents, options).await
    }
}

pub struct Harness<S> {
    pub store: Arc<S>,
    pub locks: Arc<MemoryLockProvider>,
    pub hooks: Arc<RecordingHooks>,
    pub manager: EngineManager<Arc<RecordingHooks>>,
}

pub async fn harness_with<S: DocumentStore + 'static>(
    store: Arc<S>,
    hooks: RecordingHooks,
) -> Harness<S> {
    let locks = Arc::new(MemoryLockProvider::new());
    let hooks = Arc::new(hooks);
    let manager = EngineManager::new(
        "asset",
        hooks.clone(),
        store.clone(),
        locks.clone(),
        &test_config(),
    )
    .unwrap();
    manager.init().await.unwrap();

    Harness {
        store,
        locks,
        hooks,
        manager,
    }
}

pub async fn harness() -> Harness<MemoryStore> {
    harness_with(Arc::new(MemoryStore::new()), RecordingHooks::new(&["assets"])).await
}

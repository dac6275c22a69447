#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tenantry::pipe::RequestContext;
use tenantry::{
    Document, DocumentGateway, DocumentStore, MemoryStore, PipeRegistry, Result, TenantryError,
};
use tenantry_sync::{CollectionSynchronizer, SyncPipeline, SyncedDocument};

pub const INDEX: &str = "acme";
pub const SRC: &str = "assets";
pub const DST: &str = "asset-mirror";

/// Mirrors `assets` documents as `mirror-{id}`, optionally keeping only one
/// group, and records the after-hooks.
#[derive(Default)]
pub struct MirrorSync {
    pub only_group: Option<String>,
    pub written: Mutex<Vec<Vec<String>>>,
    pub deleted: Mutex<Vec<Vec<String>>>,
}

impl MirrorSync {
    pub fn only_group(group: &str) -> Self {
        Self {
            only_group: Some(group.to_string()),
            ..Default::default()
        }
    }

    pub fn written(&self) -> Vec<Vec<String>> {
        self.written.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<Vec<String>> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CollectionSynchronizer for MirrorSync {
    type Body = Value;

    fn convert_id(&self, document: &Document, _ctx: &RequestContext) -> Result<String> {
        if document.source["emptyId"] == json!(true) {
            return Ok(String::new());
        }
        Ok(format!("mirror-{}", document.id))
    }

    async fn convert_body(&self, document: &Document, _ctx: &RequestContext) -> Result<Value> {
        if document.source["poison"] == json!(true) {
            return Err(TenantryError::InvalidDocument(format!(
                "cannot mirror {}",
                document.id
            )));
        }
        let mut body = document.source.clone();
        body["sourceId"] = json!(document.id);
        Ok(body)
    }

    fn filter(&self, documents: Vec<Document>) -> Vec<Document> {
        match &self.only_group {
            Some(group) => documents
                .into_iter()
                .filter(|d| d.source["group"] == json!(group))
                .collect(),
            None => documents,
        }
    }

    async fn after_write_documents(&self, index: &str, documents: &[SyncedDocument]) -> Result<()> {
        assert_eq!(index, INDEX);
        self.written
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.id.clone()).collect());
        Ok(())
    }

    async fn after_delete_documents(&self, index: &str, ids: &[String]) -> Result<()> {
        assert_eq!(index, INDEX);
        self.deleted.lock().unwrap().push(ids.to_vec());
        Ok(())
    }
}

pub struct SyncHarness {
    pub store: Arc<MemoryStore>,
    pub pipes: Arc<PipeRegistry>,
    pub gateway: DocumentGateway,
    pub pipeline: Arc<SyncPipeline<MirrorSync>>,
}

impl SyncHarness {
    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(INDEX, SRC)
    }

    pub async fn write(&self, id: &str, body: Value) -> Result<Vec<Document>> {
        self.gateway
            .write(&self.ctx(), vec![Document::new(id, body)])
            .await
    }

    pub fn dst_count(&self) -> usize {
        self.store.document_count(INDEX, DST)
    }

    pub async fn dst(&self, id: &str) -> Option<Document> {
        self.store.document_get(INDEX, DST, id).await.unwrap()
    }
}

pub async fn harness(sync: MirrorSync) -> SyncHarness {
    let store = Arc::new(MemoryStore::new());
    store.index_create(INDEX).await.unwrap();
    for collection in [SRC, DST, "other"] {
        store
            .collection_create(INDEX, collection, &json!({}))
            .await
            .unwrap();
    }

    let pipes = Arc::new(PipeRegistry::new());
    let pipeline = SyncPipeline::new(sync, store.clone(), SRC, DST, pipes.as_ref()).unwrap();
    pipeline.start();

    SyncHarness {
        gateway: DocumentGateway::new(store.clone(), pipes.clone()),
        store,
        pipes,
        pipeline,
    }
}

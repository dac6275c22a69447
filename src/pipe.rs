//! Document events and the handlers ("pipes") chained on them.
//!
//! Every document mutation made through a [`DocumentGateway`] fires a
//! [`PipeEvent`]. Handlers registered on that event receive the documents and
//! the [`RequestContext`] and hand back the documents passed on to the next
//! handler. A handler error aborts the request.

use crate::error::{Result, TenantryError};
use crate::store::DocumentStore;
use crate::types::{BulkWriteOptions, Document, DocumentId, MultiDeleteResult, WriteOptions};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeEvent {
    BeforeWrite,
    AfterWrite,
    AfterUpdate,
    BeforeDelete,
}

impl PipeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipeEvent::BeforeWrite => "generic:document:beforeWrite",
            PipeEvent::AfterWrite => "generic:document:afterWrite",
            PipeEvent::AfterUpdate => "generic:document:afterUpdate",
            PipeEvent::BeforeDelete => "generic:document:beforeDelete",
        }
    }
}

impl std::fmt::Display for PipeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The request that produced an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub index: String,
    pub collection: String,
    pub user: Option<String>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(index: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            collection: collection.into(),
            user: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

#[async_trait]
pub trait PipeHandler: Send + Sync {
    async fn handle(&self, documents: Vec<Document>, ctx: &RequestContext)
        -> Result<Vec<Document>>;
}

/// Where components subscribe their handlers.
pub trait PipeRegistrar: Send + Sync {
    fn register(&self, event: PipeEvent, handler: Arc<dyn PipeHandler>) -> Result<()>;
}

/// In-process registry of pipe handlers.
///
/// Handlers run in registration order. Once [`PipeRegistry::seal`] has been
/// called no handler can be added anymore.
#[derive(Default)]
pub struct PipeRegistry {
    handlers: DashMap<PipeEvent, Vec<Arc<dyn PipeHandler>>>,
    sealed: AtomicBool,
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn handler_count(&self, event: PipeEvent) -> usize {
        self.handlers.get(&event).map(|h| h.len()).unwrap_or(0)
    }

    /// Pass `documents` through every handler of `event`, in order.
    pub async fn trigger(
        &self,
        event: PipeEvent,
        documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        let handlers = match self.handlers.get(&event) {
            Some(h) => h.clone(),
            None => return Ok(documents),
        };

        let mut documents = documents;
        for handler in handlers {
            documents = handler.handle(documents, ctx).await?;
        }
        Ok(documents)
    }
}

impl PipeRegistrar for PipeRegistry {
    fn register(&self, event: PipeEvent, handler: Arc<dyn PipeHandler>) -> Result<()> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(TenantryError::Implementation(format!(
                "Cannot register a pipe on \"{}\" after startup",
                event
            )));
        }
        self.handlers.entry(event).or_default().push(handler);
        tracing::debug!("Registered pipe on {}", event);
        Ok(())
    }
}

/// Document API that fires pipe events around store mutations.
pub struct DocumentGateway {
    store: Arc<dyn DocumentStore>,
    pipes: Arc<PipeRegistry>,
}

impl DocumentGateway {
    pub fn new(store: Arc<dyn DocumentStore>, pipes: Arc<PipeRegistry>) -> Self {
        Self { store, pipes }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Create-or-replace `documents`. Documents still without an id after
    /// the before-write pipes get a random one.
    pub async fn write(
        &self,
        ctx: &RequestContext,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let mut documents = self
            .pipes
            .trigger(PipeEvent::BeforeWrite, documents, ctx)
            .await?;
        for doc in documents.iter_mut().filter(|d| d.id.is_empty()) {
            doc.id = uuid::Uuid::new_v4().to_string();
        }

        let result = self
            .store
            .m_write(
                &ctx.index,
                &ctx.collection,
                documents,
                BulkWriteOptions::default(),
            )
            .await?;

        self.pipes
            .trigger(PipeEvent::AfterWrite, result.successes, ctx)
            .await
    }

    /// Apply partial `changes`; after-update handlers receive the changes,
    /// not the merged documents.
    ///
    /// Changes are applied in order and the first store failure stops the
    /// batch. The changes applied before it still go through the
    /// after-update handlers, then the failure is returned.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        changes: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let mut updated = Vec::with_capacity(changes.len());
        let mut applied = Vec::with_capacity(changes.len());
        let mut failure = None;
        for change in changes {
            match self
                .store
                .document_update(
                    &ctx.index,
                    &ctx.collection,
                    &change.id,
                    change.source.clone(),
                    WriteOptions::default(),
                )
                .await
            {
                Ok(doc) => {
                    updated.push(doc);
                    applied.push(change);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if !applied.is_empty() {
            let fired = self
                .pipes
                .trigger(PipeEvent::AfterUpdate, applied, ctx)
                .await;
            if let Err(e) = fired {
                match &failure {
                    Some(_) => tracing::error!(
                        "after-update pipes failed on {}/{} for a partially applied batch: {}",
                        ctx.index,
                        ctx.collection,
                        e
                    ),
                    None => return Err(e),
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(updated),
        }
    }

    /// Delete `ids`; before-delete handlers receive id-only documents.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        ids: Vec<DocumentId>,
    ) -> Result<MultiDeleteResult> {
        let stubs: Vec<Document> = ids
            .into_iter()
            .map(|id| Document::new(id, json!({})))
            .collect();
        let stubs = self
            .pipes
            .trigger(PipeEvent::BeforeDelete, stubs, ctx)
            .await?;

        let ids: Vec<DocumentId> = stubs.into_iter().map(|d| d.id).collect();
        self.store
            .m_delete(&ctx.index, &ctx.collection, &ids, WriteOptions::default())
            .await
    }

    /// Shorthand for writing a single document body.
    pub async fn write_one(
        &self,
        ctx: &RequestContext,
        id: Option<&str>,
        body: Value,
    ) -> Result<Document> {
        let mut written = self
            .write(ctx, vec![Document::new(id.unwrap_or_default(), body)])
            .await?;
        written.pop().ok_or_else(|| {
            TenantryError::Store(format!(
                "write on {}/{} returned no document",
                ctx.index, ctx.collection
            ))
        })
    }
}

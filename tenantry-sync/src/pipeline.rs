use crate::config::SyncConfig;
use crate::synchronizer::CollectionSynchronizer;
use crate::types::{SyncStats, SyncedDocument};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tenantry::pipe::{PipeEvent, PipeHandler, PipeRegistrar, RequestContext};
use tenantry::utils::now_ms;
use tenantry::{
    AuditInfo, BulkWriteOptions, DocFailure, Document, DocumentId, DocumentStore, Refresh,
    Result, TenantryError, WriteKind, WriteOptions, AUDIT_FIELD,
};

#[derive(Default)]
struct Counters {
    batches_written: AtomicU64,
    documents_written: AtomicU64,
    documents_deleted: AtomicU64,
    events_skipped: AtomicU64,
}

/// Replicates a source collection into a destination collection of the
/// same index, driven by document events.
///
/// Every destination write of a batch is one strict bulk operation: a single
/// failure fails the batch and the error is returned to the request that
/// fired the event. Source mutations are never rolled back.
pub struct SyncPipeline<S: CollectionSynchronizer> {
    synchronizer: S,
    store: Arc<dyn DocumentStore>,
    src_collection: String,
    dst_collection: String,
    enabled: AtomicBool,
    notify: AtomicBool,
    counters: Counters,
}

impl<S: CollectionSynchronizer> SyncPipeline<S> {
    /// Build a disabled pipeline and register its handlers on `registrar`.
    pub fn new(
        synchronizer: S,
        store: Arc<dyn DocumentStore>,
        src_collection: impl Into<String>,
        dst_collection: impl Into<String>,
        registrar: &dyn PipeRegistrar,
    ) -> Result<Arc<Self>> {
        let src_collection = src_collection.into();
        let dst_collection = dst_collection.into();

        if src_collection.is_empty() || dst_collection.is_empty() {
            return Err(TenantryError::Implementation(
                "Synchronized collection names cannot be empty".to_string(),
            ));
        }
        if src_collection == dst_collection {
            return Err(TenantryError::Implementation(format!(
                "Cannot synchronize collection \"{}\" into itself",
                src_collection
            )));
        }

        let pipeline = Arc::new(Self {
            synchronizer,
            store,
            src_collection,
            dst_collection,
            enabled: AtomicBool::new(false),
            notify: AtomicBool::new(true),
            counters: Counters::default(),
        });

        for event in [
            PipeEvent::AfterWrite,
            PipeEvent::AfterUpdate,
            PipeEvent::BeforeDelete,
        ] {
            registrar.register(
                event,
                Arc::new(SyncHandler {
                    pipeline: pipeline.clone(),
                    event,
                }),
            )?;
        }

        Ok(pipeline)
    }

    pub fn synchronizer(&self) -> &S {
        &self.synchronizer
    }

    pub fn src_collection(&self) -> &str {
        &self.src_collection
    }

    pub fn dst_collection(&self) -> &str {
        &self.dst_collection
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("[SYNC {}] started", self.tag());
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        tracing::info!("[SYNC {}] stopped", self.tag());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn apply_config(&self, config: &SyncConfig) {
        self.notify.store(config.notify, Ordering::SeqCst);
        if config.enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            batches_written: self.counters.batches_written.load(Ordering::Relaxed),
            documents_written: self.counters.documents_written.load(Ordering::Relaxed),
            documents_deleted: self.counters.documents_deleted.load(Ordering::Relaxed),
            events_skipped: self.counters.events_skipped.load(Ordering::Relaxed),
        }
    }

    /// Replicate freshly written source documents as creates.
    pub async fn on_after_write(
        &self,
        documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        if self.should_skip(ctx) {
            return Ok(documents);
        }

        let selected = self.synchronizer.filter(documents.clone());
        if !selected.is_empty() {
            self.write_documents(ctx, selected, WriteKind::Create).await?;
        }
        Ok(documents)
    }

    /// Replicate updated source documents. Events only carry the changes, so
    /// the full documents are fetched again first.
    pub async fn on_after_update(
        &self,
        documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        if self.should_skip(ctx) {
            return Ok(documents);
        }

        let entire = self.fetch_entire_documents(ctx, &documents).await?;
        let selected = self.synchronizer.filter(entire);
        if !selected.is_empty() {
            self.write_documents(ctx, selected, WriteKind::Update).await?;
        }
        Ok(documents)
    }

    /// Remove the destination counterparts of source documents about to be
    /// deleted, in one batch.
    pub async fn on_before_delete(
        &self,
        documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        if self.should_skip(ctx) {
            return Ok(documents);
        }

        let entire = self.fetch_entire_documents(ctx, &documents).await?;
        let selected = self.synchronizer.filter(entire);
        if selected.is_empty() {
            return Ok(documents);
        }

        let ids = selected
            .iter()
            .map(|doc| {
                self.synchronizer
                    .convert_id(doc, ctx)
                    .map_err(|e| self.conversion_error(ctx, e))
            })
            .collect::<Result<Vec<DocumentId>>>()?;

        let result = self
            .store
            .m_delete(&ctx.index, &self.dst_collection, &ids, WriteOptions::default())
            .await?;

        // Destination documents that were never replicated are already gone.
        let failures: Vec<DocFailure> = result
            .errors
            .into_iter()
            .filter(|f| !f.is_not_found())
            .collect();
        if !failures.is_empty() {
            return Err(self.bulk_error(ctx, failures));
        }

        self.counters
            .documents_deleted
            .fetch_add(result.successes.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            "[SYNC {}] {} deleted {} documents",
            self.tag(),
            ctx.index,
            result.successes.len()
        );

        self.synchronizer
            .after_delete_documents(&ctx.index, &ids)
            .await?;
        Ok(documents)
    }

    fn should_skip(&self, ctx: &RequestContext) -> bool {
        if !self.is_enabled() || ctx.collection != self.src_collection {
            self.counters.events_skipped.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    async fn fetch_entire_documents(
        &self,
        ctx: &RequestContext,
        documents: &[Document],
    ) -> Result<Vec<Document>> {
        let ids: Vec<DocumentId> = documents.iter().map(|d| d.id.clone()).collect();
        let result = self
            .store
            .m_get(&ctx.index, &self.src_collection, &ids)
            .await?;

        if !result.errors.is_empty() {
            tracing::debug!(
                "[SYNC {}] {} documents vanished before replication: {:?}",
                self.tag(),
                result.errors.len(),
                result.errors
            );
        }
        Ok(result.successes)
    }

    async fn convert(
        &self,
        document: &Document,
        ctx: &RequestContext,
        kind: WriteKind,
        now: i64,
    ) -> Result<SyncedDocument> {
        let body = self.synchronizer.convert_body(document, ctx).await?;
        let mut body = serde_json::to_value(body)?;

        let fields = body.as_object_mut().ok_or_else(|| {
            TenantryError::InvalidDocument(format!(
                "converted body of \"{}\" is not a JSON object",
                document.id
            ))
        })?;
        if fields.get(AUDIT_FIELD).map_or(true, Value::is_null) {
            fields.insert(AUDIT_FIELD.to_string(), AuditInfo::system(kind, now).to_json());
        }

        Ok(SyncedDocument {
            id: self.synchronizer.convert_id(document, ctx)?,
            body,
        })
    }

    async fn write_documents(
        &self,
        ctx: &RequestContext,
        documents: Vec<Document>,
        kind: WriteKind,
    ) -> Result<()> {
        let now = now_ms();

        let synced = try_join_all(
            documents
                .iter()
                .map(|doc| self.convert(doc, ctx, kind, now)),
        )
        .await
        .map_err(|e| self.conversion_error(ctx, e))?;

        let batch: Vec<Document> = synced
            .iter()
            .map(|s| Document::new(s.id.clone(), s.body.clone()))
            .collect();
        let options = BulkWriteOptions {
            strict: true,
            notify: self.notify.load(Ordering::SeqCst),
            refresh: Refresh::None,
        };

        let result = self
            .store
            .m_write(&ctx.index, &self.dst_collection, batch, options)
            .await
            .map_err(|e| match e {
                TenantryError::BulkWrite { failures, .. } => self.bulk_error(ctx, failures),
                other => other,
            })?;
        if !result.errors.is_empty() {
            return Err(self.bulk_error(ctx, result.errors));
        }

        self.counters.batches_written.fetch_add(1, Ordering::Relaxed);
        self.counters
            .documents_written
            .fetch_add(synced.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            "[SYNC {}] {} wrote {} documents ({:?})",
            self.tag(),
            ctx.index,
            synced.len(),
            kind
        );

        self.synchronizer
            .after_write_documents(&ctx.index, &synced)
            .await
    }

    fn conversion_error(&self, ctx: &RequestContext, error: TenantryError) -> TenantryError {
        match error {
            e @ TenantryError::Conversion { .. } => e,
            other => TenantryError::Conversion {
                index: ctx.index.clone(),
                collection: self.src_collection.clone(),
                message: other.to_string(),
            },
        }
    }

    fn bulk_error(&self, ctx: &RequestContext, failures: Vec<DocFailure>) -> TenantryError {
        tracing::error!(
            "[SYNC {}] {} batch failed for {} documents",
            self.tag(),
            ctx.index,
            failures.len()
        );
        TenantryError::BulkWrite {
            index: ctx.index.clone(),
            collection: self.dst_collection.clone(),
            failures,
        }
    }

    fn tag(&self) -> String {
        format!("{}->{}", self.src_collection, self.dst_collection)
    }
}

struct SyncHandler<S: CollectionSynchronizer> {
    pipeline: Arc<SyncPipeline<S>>,
    event: PipeEvent,
}

#[async_trait]
impl<S: CollectionSynchronizer> PipeHandler for SyncHandler<S> {
    async fn handle(
        &self,
        documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        match self.event {
            PipeEvent::AfterWrite => self.pipeline.on_after_write(documents, ctx).await,
            PipeEvent::AfterUpdate => self.pipeline.on_after_update(documents, ctx).await,
            PipeEvent::BeforeDelete => self.pipeline.on_before_delete(documents, ctx).await,
            PipeEvent::BeforeWrite => Ok(documents),
        }
    }
}

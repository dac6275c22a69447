use crate::types::SyncedDocument;
use async_trait::async_trait;
use serde::Serialize;
use tenantry::pipe::RequestContext;
use tenantry::{Document, Result};

/// How documents of a source collection map to a destination collection.
///
/// `convert_id` must be deterministic: the same source document always maps
/// to the same destination id, otherwise updates and deletes miss their
/// target.
#[async_trait]
pub trait CollectionSynchronizer: Send + Sync + 'static {
    /// Destination body. Must serialize to a JSON object.
    type Body: Serialize + Send;

    fn convert_id(&self, document: &Document, ctx: &RequestContext) -> Result<String>;

    async fn convert_body(&self, document: &Document, ctx: &RequestContext)
        -> Result<Self::Body>;

    /// Keep only the source documents worth replicating.
    fn filter(&self, documents: Vec<Document>) -> Vec<Document> {
        documents
    }

    /// Called after a batch was written to the destination collection.
    async fn after_write_documents(&self, _index: &str, _documents: &[SyncedDocument]) -> Result<()> {
        Ok(())
    }

    /// Called after a batch was deleted from the destination collection.
    async fn after_delete_documents(&self, _index: &str, _ids: &[String]) -> Result<()> {
        Ok(())
    }
}

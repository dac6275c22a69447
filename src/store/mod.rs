//! Boundary to the remote document store.
//!
//! Everything the engine lifecycle and the synchronization pipeline need from
//! the store goes through [`DocumentStore`]. [`memory::MemoryStore`] is the
//! reference implementation used by tests and the demo server.

pub mod memory;

use crate::error::Result;
use crate::query::Filter;
use crate::types::{
    BulkWriteOptions, BulkWriteResult, Document, DocumentId, MultiDeleteResult, MultiGetResult,
    SearchOptions, SearchResult, WriteOptions,
};
use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Fails with `IndexAlreadyExists` when the index is already there.
    async fn index_create(&self, index: &str) -> Result<()>;

    async fn collection_exists(&self, index: &str, collection: &str) -> Result<bool>;

    /// Create the collection, or replace the mappings of an existing one.
    async fn collection_create(&self, index: &str, collection: &str, mappings: &Value)
        -> Result<()>;

    async fn collection_delete(&self, index: &str, collection: &str) -> Result<()>;

    async fn document_exists(&self, index: &str, collection: &str, id: &str) -> Result<bool>;

    async fn document_get(
        &self,
        index: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>>;

    /// Conditional create: fails with `DocumentConflict` if `id` is taken.
    async fn document_create(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        body: Value,
        options: WriteOptions,
    ) -> Result<Document>;

    /// Partial update (deep merge of `changes`); fails with `DocumentNotFound`.
    async fn document_update(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        changes: Value,
        options: WriteOptions,
    ) -> Result<Document>;

    /// Fails with `DocumentNotFound`.
    async fn document_delete(
        &self,
        index: &str,
        collection: &str,
        id: &str,
        options: WriteOptions,
    ) -> Result<()>;

    async fn search(
        &self,
        index: &str,
        collection: &str,
        filter: &Filter,
        options: SearchOptions,
    ) -> Result<SearchResult>;

    async fn m_get(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<MultiGetResult>;

    async fn m_delete(
        &self,
        index: &str,
        collection: &str,
        ids: &[DocumentId],
        options: WriteOptions,
    ) -> Result<MultiDeleteResult>;

    /// Create-or-replace a batch of documents.
    ///
    /// With `options.strict`, a single rejected document fails the whole call
    /// with `BulkWrite` and nothing is applied.
    async fn m_write(
        &self,
        index: &str,
        collection: &str,
        documents: Vec<Document>,
        options: BulkWriteOptions,
    ) -> Result<BulkWriteResult>;
}

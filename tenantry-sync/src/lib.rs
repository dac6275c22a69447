//! Keeps a destination collection of every tenant index in sync with a
//! source collection.
//!
//! Implement [`CollectionSynchronizer`] to say how a source document maps to
//! a destination document, then build a [`SyncPipeline`] on the pipe
//! registrar that document writes go through. The pipeline starts disabled;
//! call [`SyncPipeline::start`] or [`SyncPipeline::apply_config`].

pub mod config;
pub mod pipeline;
pub mod synchronizer;
pub mod types;

pub use config::SyncConfig;
pub use pipeline::SyncPipeline;
pub use synchronizer::CollectionSynchronizer;
pub use types::{SyncStats, SyncedDocument};

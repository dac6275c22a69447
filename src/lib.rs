//! # Tenantry
//!
//! Per-tenant engine provisioning and collection synchronization for
//! multi-tenant document platforms.
//!
//! An *engine* is a named capability (say `asset`) that gets provisioned on a
//! tenant index on demand: its index is created at most once under a named
//! lock, its collections are set up by the engine's [`EngineHooks`], and a
//! record in the admin index says the engine is active there.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantry::{
//!     CollectionsEngine, EngineConfig, EngineManager, EngineManifest, MemoryLockProvider,
//!     MemoryStore,
//! };
//!
//! # async fn run() -> tenantry::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let manifest = EngineManifest::from_json(r#"{"collections": {"assets": {}}}"#)?;
//! let engine = EngineManager::new(
//!     "asset",
//!     CollectionsEngine::new(store.clone(), manifest),
//!     store,
//!     Arc::new(MemoryLockProvider::new()),
//!     &EngineConfig::from_env(),
//! )?;
//! engine.init().await?;
//!
//! let provisioned = engine.create("acme", Some("europe")).await?;
//! assert_eq!(provisioned.collections, vec!["assets"]);
//! assert!(engine.exists("acme").await?);
//! # Ok(())
//! # }
//! ```
//!
//! Keeping a derived collection in sync with a source collection is the job
//! of the companion `tenantry-sync` crate, which plugs into the
//! [`pipe::PipeRegistrar`] defined here.
//!
//! ## Feature flags
//!
//! | Feature | Dependencies | Use case |
//! |---------|-------------|----------|
//! | `axum-support` | axum | [`TenantryError`] implements `IntoResponse` |
//! | `openapi` | utoipa | OpenAPI schemas for engine payloads |

pub mod config;
pub mod config_manager;
pub mod engine;
pub mod error;
pub mod lock;
pub mod pipe;
pub mod query;
pub mod store;
pub mod types;
pub mod utils;

pub use config::EngineConfig;
pub use config_manager::ConfigManager;
pub use engine::{
    CollectionsEngine, EngineHooks, EngineManager, EngineManifest, EngineRecord, EngineRegistry,
    Provisioned,
};
pub use error::{Result, TenantryError};
pub use lock::{LockConfig, LockProvider, MemoryLockProvider, NamedMutex};
pub use pipe::{DocumentGateway, PipeEvent, PipeHandler, PipeRegistrar, PipeRegistry, RequestContext};
pub use query::Filter;
pub use store::{DocumentStore, MemoryStore};
pub use types::*;

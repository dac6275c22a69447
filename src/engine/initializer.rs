use crate::error::{Result, TenantryError};
use crate::lock::NamedMutex;
use crate::store::DocumentStore;
use std::sync::Arc;

/// Creates tenant indexes at most once, even when several provisioning
/// requests for the same tenant race each other.
pub struct IndexInitializer {
    store: Arc<dyn DocumentStore>,
    mutex: NamedMutex,
    plugin_name: String,
}

impl IndexInitializer {
    pub fn new(store: Arc<dyn DocumentStore>, mutex: NamedMutex, plugin_name: impl Into<String>) -> Self {
        Self {
            store,
            mutex,
            plugin_name: plugin_name.into(),
        }
    }

    pub fn lock_name(&self, index: &str) -> String {
        format!("{}/initIndex/{}", self.plugin_name, index)
    }

    /// Make sure `index` exists. Returns `true` when this call created it.
    ///
    /// The existence check and the creation run under the per-tenant lock,
    /// which is released on every path, including a failed creation. The lock
    /// is per plugin, so an index created concurrently by another plugin
    /// counts as already there.
    pub async fn ensure_index(&self, index: &str) -> Result<bool> {
        let store = &self.store;
        self.mutex
            .with_lock(&self.lock_name(index), || async move {
                if store.index_exists(index).await? {
                    return Ok(false);
                }
                match store.index_create(index).await {
                    Ok(()) => {
                        tracing::info!("Created index {}", index);
                        Ok(true)
                    }
                    Err(TenantryError::IndexAlreadyExists(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await
    }
}

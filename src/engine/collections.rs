use super::{EngineHooks, Provisioned};
use crate::error::{Result, TenantryError};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Collections an engine provisions on every tenant, with their mappings.
///
/// ```json
/// { "collections": { "assets": { "properties": { "model": { "type": "keyword" } } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineManifest {
    #[serde(default)]
    pub collections: Map<String, Value>,
}

impl EngineManifest {
    pub fn from_json(raw: &str) -> Result<Self> {
        let manifest: EngineManifest = serde_json::from_str(raw)?;
        for (name, mappings) in &manifest.collections {
            if !mappings.is_object() {
                return Err(TenantryError::Config(format!(
                    "mappings of collection \"{}\" must be an object",
                    name
                )));
            }
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TenantryError::Config(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        let manifest = Self::from_json(&raw)?;
        tracing::info!(
            "Loaded engine manifest {} ({} collections)",
            path.display(),
            manifest.collections.len()
        );
        Ok(manifest)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}

/// Engine whose provisioning is "create these collections with these
/// mappings". Updating re-applies the mappings.
pub struct CollectionsEngine {
    store: Arc<dyn DocumentStore>,
    manifest: EngineManifest,
}

impl CollectionsEngine {
    pub fn new(store: Arc<dyn DocumentStore>, manifest: EngineManifest) -> Self {
        Self { store, manifest }
    }

    pub fn manifest(&self) -> &EngineManifest {
        &self.manifest
    }

    async fn apply_mappings(&self, index: &str) -> Result<Provisioned> {
        for (collection, mappings) in &self.manifest.collections {
            self.store
                .collection_create(index, collection, mappings)
                .await?;
        }
        Ok(Provisioned::new(self.manifest.collection_names()))
    }
}

#[async_trait::async_trait]
impl EngineHooks for CollectionsEngine {
    async fn on_create(&self, index: &str, _group: &str) -> Result<Provisioned> {
        self.apply_mappings(index).await
    }

    async fn on_update(&self, index: &str, _group: &str) -> Result<Provisioned> {
        self.apply_mappings(index).await
    }

    async fn on_delete(&self, index: &str) -> Result<Provisioned> {
        for collection in self.manifest.collections.keys() {
            if self.store.collection_exists(index, collection).await? {
                self.store.collection_delete(index, collection).await?;
            }
        }
        Ok(Provisioned::new(self.manifest.collection_names()))
    }
}

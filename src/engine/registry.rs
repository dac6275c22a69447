use crate::error::{Result, TenantryError};
use crate::query::Filter;
use crate::store::DocumentStore;
use crate::types::{Document, SearchOptions, WriteOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Group used when a caller does not name one.
pub const DEFAULT_GROUP: &str = "commons";

/// Maximum number of records returned by one `list` query.
pub const LIST_PAGE_SIZE: usize = 1000;

/// One provisioned engine instance, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EngineRecord {
    pub tenant_index: String,
    pub group: String,
    pub plugin_name: String,
}

impl EngineRecord {
    fn from_document(doc: &Document, plugin_name: &str) -> Option<Self> {
        let tenant_index = doc.field("engine.index")?.as_str()?.to_string();
        let group = doc
            .field("engine.group")
            .or_else(|| doc.field("group"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_GROUP)
            .to_string();
        let plugin_name = doc
            .field("engine.name")
            .and_then(Value::as_str)
            .unwrap_or(plugin_name)
            .to_string();
        Some(EngineRecord {
            tenant_index,
            group,
            plugin_name,
        })
    }
}

/// Store adapter for the engine records of one plugin.
///
/// Records live in `{admin_index}/{collection}` under the deterministic id
/// `engine-{plugin}--{tenantIndex}`; the existence of that document is the
/// only signal that the engine is active on a tenant.
pub struct EngineRegistry {
    store: Arc<dyn DocumentStore>,
    admin_index: String,
    collection: String,
    plugin_name: String,
}

impl EngineRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        admin_index: impl Into<String>,
        collection: impl Into<String>,
        plugin_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            admin_index: admin_index.into(),
            collection: collection.into(),
            plugin_name: plugin_name.into(),
        }
    }

    pub fn admin_index(&self) -> &str {
        &self.admin_index
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Config-document type of this plugin's records: `engine-{plugin}`.
    pub fn record_type(&self) -> String {
        format!("engine-{}", self.plugin_name)
    }

    pub fn engine_id(&self, tenant_index: &str) -> String {
        format!("engine-{}--{}", self.plugin_name, tenant_index)
    }

    /// Mappings of the `engine` payload of a record.
    pub fn mappings() -> Value {
        json!({
            "properties": {
                "engine": {
                    "properties": {
                        "index": { "type": "keyword" },
                        "group": { "type": "keyword" },
                        "name": { "type": "keyword" }
                    }
                }
            }
        })
    }

    /// A registry location that was never set up holds no engine.
    pub async fn exists(&self, tenant_index: &str) -> Result<bool> {
        match self
            .store
            .document_exists(
                &self.admin_index,
                &self.collection,
                &self.engine_id(tenant_index),
            )
            .await
        {
            Err(TenantryError::IndexNotFound(_))
            | Err(TenantryError::CollectionNotFound { .. }) => Ok(false),
            other => other,
        }
    }

    pub async fn get(&self, tenant_index: &str) -> Result<Option<EngineRecord>> {
        let doc = self
            .store
            .document_get(
                &self.admin_index,
                &self.collection,
                &self.engine_id(tenant_index),
            )
            .await?;
        Ok(doc.and_then(|d| EngineRecord::from_document(&d, &self.plugin_name)))
    }

    /// Conditional create of the record; an existing one is `EngineAlreadyExists`.
    pub async fn insert(&self, tenant_index: &str, group: &str) -> Result<()> {
        let body = json!({
            "type": self.record_type(),
            "group": group,
            "engine": {
                "index": tenant_index,
                "group": group,
                "name": self.plugin_name,
            }
        });

        self.store
            .document_create(
                &self.admin_index,
                &self.collection,
                &self.engine_id(tenant_index),
                body,
                WriteOptions::wait_for(),
            )
            .await
            .map(|_| ())
            .map_err(|e| match e {
                TenantryError::DocumentConflict { .. } => TenantryError::EngineAlreadyExists {
                    plugin: self.plugin_name.clone(),
                    index: tenant_index.to_string(),
                },
                other => other,
            })
    }

    pub async fn update_group(&self, tenant_index: &str, group: &str) -> Result<()> {
        self.store
            .document_update(
                &self.admin_index,
                &self.collection,
                &self.engine_id(tenant_index),
                json!({ "group": group, "engine": { "group": group } }),
                WriteOptions::wait_for(),
            )
            .await
            .map(|_| ())
    }

    /// Remove the record. Returns `false` when it was already gone.
    pub async fn remove(&self, tenant_index: &str) -> Result<bool> {
        match self
            .store
            .document_delete(
                &self.admin_index,
                &self.collection,
                &self.engine_id(tenant_index),
                WriteOptions::wait_for(),
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(TenantryError::DocumentNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Records of this plugin, optionally restricted to one group.
    pub async fn list(&self, group: Option<&str>) -> Result<Vec<EngineRecord>> {
        let mut clauses = vec![Filter::equals("type", self.record_type())];
        if let Some(group) = group {
            clauses.push(Filter::equals("group", group));
        }

        let result = self
            .store
            .search(
                &self.admin_index,
                &self.collection,
                &Filter::And(clauses),
                SearchOptions {
                    size: LIST_PAGE_SIZE,
                    ..Default::default()
                },
            )
            .await?;

        if result.total > result.hits.len() {
            tracing::warn!(
                "[ENGINE {}] {} engines registered, listing the first {}",
                self.plugin_name,
                result.total,
                result.hits.len()
            );
        }

        Ok(result
            .hits
            .iter()
            .filter_map(|doc| EngineRecord::from_document(doc, &self.plugin_name))
            .collect())
    }
}

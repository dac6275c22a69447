//! Typed configuration documents.
//!
//! Config documents share one collection per index and are told apart by
//! their `type` field; the payload of a `{type}` document lives under the
//! `{type}` key. Each registered type contributes its mappings to the
//! collection and gets deterministic ids of the form `{type}--{name}`.

use crate::error::{Result, TenantryError};
use crate::pipe::{PipeEvent, PipeHandler, PipeRegistrar, RequestContext};
use crate::store::DocumentStore;
use crate::types::Document;
use crate::utils::{kebab_case, merge_json};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Derives the `{name}` part of a config id from the typed payload.
pub type IdGenerator = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

fn default_id_generator(content: &Value) -> Result<String> {
    content
        .get("name")
        .and_then(Value::as_str)
        .map(kebab_case)
        .ok_or_else(|| TenantryError::InvalidDocument("missing \"name\" property".to_string()))
}

pub struct ConfigManager {
    store: Arc<dyn DocumentStore>,
    collection: String,
    types: Arc<DashMap<String, Value>>,
    id_generator: IdGenerator,
}

impl ConfigManager {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            types: Arc::new(DashMap::new()),
            id_generator: Arc::new(default_id_generator),
        }
    }

    #[must_use]
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = generator;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn base_mappings() -> Value {
        json!({
            "dynamic": "strict",
            "properties": {
                "type": { "type": "keyword" },
                "group": { "type": "keyword" }
            }
        })
    }

    /// Register a config type and the mappings of its payload.
    pub fn register(&self, config_type: &str, mappings: Value) -> Result<()> {
        match self.types.entry(config_type.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TenantryError::Implementation(
                format!("Config for \"{}\" already registered.", config_type),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(mappings);
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, config_type: &str) -> bool {
        self.types.contains_key(config_type)
    }

    /// Base mappings, merged with `mappings_override`, plus one property per
    /// registered type.
    pub fn full_mappings(&self, mappings_override: &Value) -> Value {
        let mut mappings = Self::base_mappings();
        if mappings_override.is_object() {
            merge_json(&mut mappings, mappings_override);
        }

        if !mappings.get("properties").is_some_and(Value::is_object) {
            mappings["properties"] = Value::Object(Map::new());
        }
        if let Some(properties) = mappings.get_mut("properties").and_then(Value::as_object_mut)
        {
            for entry in self.types.iter() {
                properties.insert(entry.key().clone(), entry.value().clone());
            }
        }
        mappings
    }

    /// Create (or migrate) the config collection of `index`.
    pub async fn create_collection(&self, index: &str, mappings_override: &Value) -> Result<()> {
        let mappings = self.full_mappings(mappings_override);
        self.store
            .collection_create(index, &self.collection, &mappings)
            .await?;
        tracing::info!(
            "Config collection {}/{} ready ({} types)",
            index,
            self.collection,
            self.types.len()
        );
        Ok(())
    }

    /// Subscribe the id generator on before-write events.
    pub fn attach(&self, registrar: &dyn PipeRegistrar) -> Result<()> {
        registrar.register(
            PipeEvent::BeforeWrite,
            Arc::new(IdAssigner {
                collection: self.collection.clone(),
                types: self.types.clone(),
                id_generator: self.id_generator.clone(),
            }),
        )
    }
}

struct IdAssigner {
    collection: String,
    types: Arc<DashMap<String, Value>>,
    id_generator: IdGenerator,
}

#[async_trait]
impl PipeHandler for IdAssigner {
    async fn handle(
        &self,
        mut documents: Vec<Document>,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>> {
        if ctx.collection != self.collection {
            return Ok(documents);
        }

        for doc in documents.iter_mut() {
            if !doc.id.is_empty() {
                continue;
            }
            let Some(config_type) = doc.source.get("type").and_then(Value::as_str) else {
                continue;
            };
            if !self.types.contains_key(config_type) {
                continue;
            }

            let content = doc.source.get(config_type).unwrap_or(&Value::Null);
            let name = (self.id_generator)(content).map_err(|e| {
                TenantryError::Implementation(format!(
                    "Error when generating ID for config document of type \"{}\": {}",
                    config_type, e
                ))
            })?;
            doc.id = format!("{}--{}", config_type, name);
        }
        Ok(documents)
    }
}

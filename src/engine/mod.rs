//! Per-tenant engine lifecycle.
//!
//! An engine is a named capability (`pluginName`) provisioned on a tenant
//! index. [`EngineManager`] drives `create`/`update`/`delete`/`list`/`exists`,
//! gating the provisioning hooks of a concrete [`EngineHooks`] on the engine
//! registry and serializing index creation per tenant.
//!
//! ```text
//! absent --create--> provisioning --record written--> active
//! active --update--> active
//! active --delete--> deprovisioning --record removed--> absent
//! ```

pub mod collections;
pub mod initializer;
pub mod registry;

pub use collections::{CollectionsEngine, EngineManifest};
pub use initializer::IndexInitializer;
pub use registry::{EngineRecord, EngineRegistry, DEFAULT_GROUP, LIST_PAGE_SIZE};

use crate::config::EngineConfig;
use crate::error::{Result, TenantryError};
use crate::lock::{LockProvider, NamedMutex};
use crate::store::DocumentStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Collections touched by a provisioning hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Provisioned {
    pub collections: Vec<String>,
}

impl Provisioned {
    pub fn new(collections: Vec<String>) -> Self {
        Self { collections }
    }
}

/// Services handed to [`EngineHooks::init`].
pub struct EngineContext<'a> {
    pub plugin_name: &'a str,
    pub admin_index: &'a str,
    pub store: &'a Arc<dyn DocumentStore>,
}

/// Provisioning behavior of a concrete engine type.
///
/// The manager only calls `on_create` for tenants without a record, and
/// `on_update`/`on_delete` for tenants with one. Two racing `create` calls
/// may both run `on_create`; the loser then fails with `EngineAlreadyExists`,
/// so `on_create` has to tolerate resources that already exist.
#[async_trait]
pub trait EngineHooks: Send + Sync {
    async fn init(&self, _ctx: &EngineContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn on_create(&self, index: &str, group: &str) -> Result<Provisioned>;

    async fn on_update(&self, index: &str, group: &str) -> Result<Provisioned>;

    async fn on_delete(&self, index: &str) -> Result<Provisioned>;
}

#[async_trait]
impl<T: EngineHooks + ?Sized> EngineHooks for Arc<T> {
    async fn init(&self, ctx: &EngineContext<'_>) -> Result<()> {
        (**self).init(ctx).await
    }

    async fn on_create(&self, index: &str, group: &str) -> Result<Provisioned> {
        (**self).on_create(index, group).await
    }

    async fn on_update(&self, index: &str, group: &str) -> Result<Provisioned> {
        (**self).on_update(index, group).await
    }

    async fn on_delete(&self, index: &str) -> Result<Provisioned> {
        (**self).on_delete(index).await
    }
}

fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TenantryError::Implementation(
            "Engine plugin name cannot be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains("--") {
        return Err(TenantryError::Implementation(format!(
            "Engine plugin name \"{}\" cannot contain \"/\" or \"--\"",
            name
        )));
    }
    Ok(())
}

pub struct EngineManager<H: EngineHooks> {
    plugin_name: String,
    hooks: H,
    store: Arc<dyn DocumentStore>,
    registry: EngineRegistry,
    initializer: IndexInitializer,
}

impl<H: EngineHooks> EngineManager<H> {
    pub fn new(
        plugin_name: impl Into<String>,
        hooks: H,
        store: Arc<dyn DocumentStore>,
        locks: Arc<dyn LockProvider>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let plugin_name = plugin_name.into();
        validate_plugin_name(&plugin_name)?;

        let registry = EngineRegistry::new(
            store.clone(),
            config.admin_index.clone(),
            config.config_collection.clone(),
            plugin_name.clone(),
        );
        let initializer = IndexInitializer::new(
            store.clone(),
            NamedMutex::new(locks, config.lock.clone()),
            plugin_name.clone(),
        );

        Ok(Self {
            plugin_name,
            hooks,
            store,
            registry,
            initializer,
        })
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Prepare the registry location and let the hooks set themselves up.
    /// Call once before serving requests.
    pub async fn init(&self) -> Result<()> {
        let admin_index = self.registry.admin_index();
        let collection = self.registry.collection();

        self.initializer.ensure_index(admin_index).await?;
        if !self.store.collection_exists(admin_index, collection).await? {
            self.store
                .collection_create(admin_index, collection, &EngineRegistry::mappings())
                .await?;
        }

        let ctx = EngineContext {
            plugin_name: &self.plugin_name,
            admin_index,
            store: &self.store,
        };
        self.hooks.init(&ctx).await?;

        tracing::info!(
            "[ENGINE {}] ready, registry in {}/{}",
            self.plugin_name,
            admin_index,
            collection
        );
        Ok(())
    }

    pub async fn exists(&self, index: &str) -> Result<bool> {
        self.registry.exists(index).await
    }

    pub async fn list(&self, group: Option<&str>) -> Result<Vec<EngineRecord>> {
        self.registry.list(group).await
    }

    /// Provision the engine on `index` and register it.
    pub async fn create(&self, index: &str, group: Option<&str>) -> Result<Provisioned> {
        let group = group.unwrap_or(DEFAULT_GROUP);

        if self.exists(index).await? {
            return Err(self.already_exists(index));
        }

        self.initializer.ensure_index(index).await?;
        let provisioned = self.hooks.on_create(index, group).await?;

        if let Err(e) = self.registry.insert(index, group).await {
            if !matches!(e, TenantryError::EngineAlreadyExists { .. }) {
                tracing::error!(
                    "[ENGINE {}] {} provisioned but not registered: {}",
                    self.plugin_name,
                    index,
                    e
                );
            }
            return Err(e);
        }

        tracing::info!(
            "[ENGINE {}] created on {} (group={}, collections={:?})",
            self.plugin_name,
            index,
            group,
            provisioned.collections
        );
        Ok(provisioned)
    }

    /// Re-run provisioning on an active engine (migrations).
    ///
    /// Without a `group` the hooks see the stored one and the record is left
    /// as is; an explicit, different `group` is written to the record.
    pub async fn update(&self, index: &str, group: Option<&str>) -> Result<Provisioned> {
        if !self.exists(index).await? {
            return Err(self.not_found(index));
        }

        let stored = self.registry.get(index).await?.map(|record| record.group);
        let target = group
            .or(stored.as_deref())
            .unwrap_or(DEFAULT_GROUP)
            .to_string();

        let provisioned = self.hooks.on_update(index, &target).await?;

        if let (Some(requested), Some(previous)) = (group, stored.as_deref()) {
            if requested != previous {
                self.registry.update_group(index, requested).await?;
                tracing::info!(
                    "[ENGINE {}] {} moved from group {} to {}",
                    self.plugin_name,
                    index,
                    previous,
                    requested
                );
            }
        }

        tracing::info!("[ENGINE {}] updated on {}", self.plugin_name, index);
        Ok(provisioned)
    }

    /// Tear down the engine on `index`.
    ///
    /// The registry record is removed whatever the outcome of `on_delete`;
    /// the hook's outcome is returned afterwards.
    pub async fn delete(&self, index: &str) -> Result<Provisioned> {
        if !self.exists(index).await? {
            return Err(self.not_found(index));
        }

        let outcome = self.hooks.on_delete(index).await;
        let cleanup = self.registry.remove(index).await;

        match (outcome, cleanup) {
            (Ok(provisioned), Ok(_)) => {
                tracing::info!("[ENGINE {}] deleted from {}", self.plugin_name, index);
                Ok(provisioned)
            }
            (Ok(_), Err(cleanup_err)) => {
                tracing::error!(
                    "[ENGINE {}] {} torn down but record removal failed: {}",
                    self.plugin_name,
                    index,
                    cleanup_err
                );
                Err(cleanup_err)
            }
            (Err(hook_err), Ok(_)) => {
                tracing::warn!(
                    "[ENGINE {}] teardown of {} failed, record removed: {}",
                    self.plugin_name,
                    index,
                    hook_err
                );
                Err(hook_err)
            }
            (Err(hook_err), Err(cleanup_err)) => {
                tracing::error!(
                    "[ENGINE {}] teardown of {} failed ({}) and record removal failed: {}",
                    self.plugin_name,
                    index,
                    hook_err,
                    cleanup_err
                );
                Err(hook_err)
            }
        }
    }

    fn already_exists(&self, index: &str) -> TenantryError {
        TenantryError::EngineAlreadyExists {
            plugin: self.plugin_name.clone(),
            index: index.to_string(),
        }
    }

    fn not_found(&self, index: &str) -> TenantryError {
        TenantryError::EngineNotFound {
            plugin: self.plugin_name.clone(),
            index: index.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_name_validation() {
        assert!(validate_plugin_name("asset").is_ok());
        assert!(validate_plugin_name("asset-tracking").is_ok());
        assert!(validate_plugin_name("").is_err());
        assert!(validate_plugin_name("a/b").is_err());
        assert!(matches!(
            validate_plugin_name("a--b"),
            Err(TenantryError::Implementation(_))
        ));
    }
}

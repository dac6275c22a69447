use crate::lock::LockConfig;
use std::time::Duration;

/// Where engine records live and how the provisioning lock behaves.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Administrative index holding the engine registry.
    pub admin_index: String,
    /// Collection of `admin_index` holding registry and config documents.
    pub config_collection: String,
    pub lock: LockConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_index: "tenantry".to_string(),
            config_collection: "config".to_string(),
            lock: LockConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TENANTRY_ADMIN_INDEX`, `TENANTRY_CONFIG_COLLECTION`,
    /// `TENANTRY_LOCK_TTL_MS` and `TENANTRY_LOCK_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(index) = std::env::var("TENANTRY_ADMIN_INDEX") {
            if !index.is_empty() {
                config.admin_index = index;
            }
        }
        if let Ok(collection) = std::env::var("TENANTRY_CONFIG_COLLECTION") {
            if !collection.is_empty() {
                config.config_collection = collection;
            }
        }
        if let Some(ttl) = env_millis("TENANTRY_LOCK_TTL_MS") {
            config.lock.lease_ttl = ttl;
        }
        if let Some(timeout) = env_millis("TENANTRY_LOCK_TIMEOUT_MS") {
            config.lock.acquire_timeout = timeout;
        }

        tracing::debug!(
            "Engine config: admin_index={}, config_collection={}, lease_ttl={:?}, acquire_timeout={:?}",
            config.admin_index,
            config.config_collection,
            config.lock.lease_ttl,
            config.lock.acquire_timeout
        );
        config
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether pipelines replicate at all in this deployment.
    pub enabled: bool,
    /// Whether destination writes publish change notifications.
    pub notify: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notify: true,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `TENANTRY_SYNC_ENABLED` and `TENANTRY_SYNC_NOTIFY`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            enabled: env_flag("TENANTRY_SYNC_ENABLED").unwrap_or(defaults.enabled),
            notify: env_flag("TENANTRY_SYNC_NOTIFY").unwrap_or(defaults.notify),
        };
        tracing::debug!(
            "Sync config: enabled={}, notify={}",
            config.enabled,
            config.notify
        );
        config
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!("Ignoring {}={:?}: expected a boolean", key, raw);
            None
        }
    }
}

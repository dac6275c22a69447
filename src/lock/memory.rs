use super::{LockLease, LockProvider};
use crate::error::{Result, TenantryError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

/// Process-local [`LockProvider`] keyed by lock name.
#[derive(Default)]
pub struct MemoryLockProvider {
    leases: DashMap<String, LockLease>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lease on `name`, expired or not.
    pub fn lease(&self, name: &str) -> Option<LockLease> {
        self.leases.get(name).map(|l| l.clone())
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<LockLease>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| TenantryError::Config(format!("invalid lease ttl: {}", e)))?;
        let lease = LockLease {
            name: name.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            expires_at: Utc::now() + ttl,
        };

        match self.leases.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(lease.clone());
                Ok(Some(lease))
            }
            Entry::Occupied(mut slot) => {
                if !slot.get().is_expired() {
                    return Ok(None);
                }
                tracing::warn!(
                    "[LOCK {}] taking over expired lease of {}",
                    name,
                    slot.get().holder
                );
                slot.insert(lease.clone());
                Ok(Some(lease))
            }
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<()> {
        let removed = self
            .leases
            .remove_if(&lease.name, |_, current| current.token == lease.token);
        if removed.is_none() {
            tracing::warn!(
                "[LOCK {}] lease of {} was lost before release",
                lease.name,
                lease.holder
            );
        }
        Ok(())
    }
}

//! Named, lease-based mutual exclusion.
//!
//! A [`LockProvider`] hands out leases on a name; a lease that is not
//! released before `expires_at` may be taken over by another holder, so a
//! crashed process never blocks a name forever. [`NamedMutex`] layers retry
//! with capped exponential backoff and scoped acquisition on top.

pub mod memory;

pub use memory::MemoryLockProvider;

use crate::error::{Result, TenantryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ownership of a named lock until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub name: String,
    /// Unique per acquisition; release only succeeds with the matching token.
    pub token: String,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl LockLease {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Take the lock if it is free or its current lease has expired.
    ///
    /// Returns `None` when another holder owns a live lease.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration)
        -> Result<Option<LockLease>>;

    /// Give the lease back. Releasing a lease that has since been taken by
    /// another holder leaves that holder's lease in place.
    async fn release(&self, lease: &LockLease) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease lifetime; bounds how long a crashed holder blocks the name.
    pub lease_ttl: Duration,
    /// Total time `lock()` keeps retrying before giving up.
    pub acquire_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

impl LockConfig {
    /// Backoff before retry `attempt` (0-indexed), capped at `max_backoff`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// `{hostname}:{pid}:{uuid}`, unique per process instance.
pub fn default_holder_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}:{}:{}", host, std::process::id(), uuid::Uuid::new_v4())
}

pub struct NamedMutex {
    provider: Arc<dyn LockProvider>,
    config: LockConfig,
    holder: String,
}

impl NamedMutex {
    pub fn new(provider: Arc<dyn LockProvider>, config: LockConfig) -> Self {
        Self {
            provider,
            config,
            holder: default_holder_id(),
        }
    }

    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire `name`, retrying until `acquire_timeout` elapses.
    pub async fn lock(&self, name: &str) -> Result<LockLease> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            if let Some(lease) = self
                .provider
                .try_acquire(name, &self.holder, self.config.lease_ttl)
                .await?
            {
                if attempt > 0 {
                    tracing::debug!("[LOCK {}] acquired after {} retries", name, attempt);
                }
                return Ok(lease);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.acquire_timeout {
                tracing::warn!(
                    "[LOCK {}] gave up after {:?} ({} attempts)",
                    name,
                    elapsed,
                    attempt + 1
                );
                return Err(TenantryError::LockAcquisition {
                    name: name.to_string(),
                    reason: format!("timed out after {} ms", elapsed.as_millis()),
                });
            }

            let remaining = self.config.acquire_timeout - elapsed;
            tokio::time::sleep(self.config.backoff_delay(attempt).min(remaining)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    pub async fn unlock(&self, lease: &LockLease) -> Result<()> {
        self.provider.release(lease).await
    }

    /// Run `f` while holding `name`. The lock is released on every exit path;
    /// a failed release is logged and does not mask the result of `f`.
    pub async fn with_lock<T, F, Fut>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let lease = self.lock(name).await?;
        let result = f().await;
        if let Err(e) = self.unlock(&lease).await {
            tracing::error!("[LOCK {}] release failed: {}", name, e);
        }
        result
    }
}

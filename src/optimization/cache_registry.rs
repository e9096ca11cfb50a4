//! Registry-backed resource reclaimer
//!
//! Hosts register their caches and connection pools by name; the registry
//! implements [`ResourceReclaimer`] by purging every one of them. A failing
//! entry does not stop the rest from being purged, the first error is
//! returned once all have been attempted.

use crate::error::{Error, Result};
use crate::optimization::remediation::{guarded, ResourceReclaimer};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// A cache that can drop its contents on demand
pub trait Purgeable: Send + Sync {
    /// Drop cached entries; returns how many were removed
    fn purge(&self) -> Result<usize>;
}

/// A pool that can close idle connections on demand
pub trait IdleConnectionPool: Send + Sync {
    /// Close idle connections; returns how many were closed
    fn close_idle(&self) -> Result<usize>;
}

/// Something that can rotate its log output
pub trait LogRotator: Send + Sync {
    fn rotate(&self) -> Result<()>;
}

#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<Vec<(String, Arc<dyn Purgeable>)>>,
    pools: RwLock<Vec<(String, Arc<dyn IdleConnectionPool>)>>,
    log_rotator: RwLock<Option<Arc<dyn LogRotator>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_cache(&self, name: impl Into<String>, cache: Arc<dyn Purgeable>) {
        self.caches.write().push((name.into(), cache));
    }

    pub fn register_pool(&self, name: impl Into<String>, pool: Arc<dyn IdleConnectionPool>) {
        self.pools.write().push((name.into(), pool));
    }

    pub fn set_log_rotator(&self, rotator: Arc<dyn LogRotator>) {
        *self.log_rotator.write() = Some(rotator);
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.pools.read().iter().map(|(name, _)| name.clone()).collect()
    }
}

fn purge_all<T: ?Sized>(
    what: &str,
    entries: &[(String, Arc<T>)],
    run: impl Fn(&T) -> Result<usize>,
) -> Result<()> {
    let mut first_error = None;

    for (name, entry) in entries {
        match guarded(|| run(entry.as_ref())) {
            Ok(count) => debug!(kind = what, name = %name, count, "Purged"),
            Err(e) => {
                warn!(kind = what, name = %name, error = %e, "Purge failed");
                first_error.get_or_insert_with(|| {
                    Error::Remediation(format!("{} '{}': {}", what, name, e))
                });
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl ResourceReclaimer for CacheRegistry {
    fn clear_caches(&self) -> Result<()> {
        let caches = self.caches.read().clone();
        purge_all("cache", &caches, |cache| cache.purge())
    }

    fn cleanup_connections(&self) -> Result<()> {
        let pools = self.pools.read().clone();
        purge_all("pool", &pools, |pool| pool.close_idle())
    }

    fn rotate_logs(&self) -> Result<()> {
        let rotator = self.log_rotator.read().clone();
        match rotator {
            Some(rotator) => guarded(|| rotator.rotate()),
            None => Ok(()),
        }
    }
}

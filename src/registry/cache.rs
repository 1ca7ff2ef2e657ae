//! TTL-bounded cache of registry lookups

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{Registry, RegistryError, ServiceInstance};

type Entries = RwLock<HashMap<String, CacheEntry>>;

/// How long past its TTL the sweeper keeps an entry around for stale fallback
pub const DEFAULT_MAX_STALE: Duration = Duration::from_secs(300);

struct CacheEntry {
    instances: Vec<ServiceInstance>,
    fetched: Instant,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(instances: Vec<ServiceInstance>) -> Self {
        Self {
            instances,
            fetched: Instant::now(),
            fetched_at: Utc::now(),
        }
    }

    /// With no TTL an entry stays fresh until invalidated
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(true, |ttl| self.fetched.elapsed() < ttl)
    }
}

/// Diagnostic view of one cached service
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub service: String,
    pub instances: usize,
    pub nodes: usize,
    pub fetched_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Serves recent registry lookups from memory
///
/// A lookup returns the cached instance list while it is younger than the TTL and
/// goes to the registry otherwise. Concurrent misses for one service share a
/// single registry query. If refreshing an expired entry fails for any reason
/// other than "not found", the stale list is served instead.
pub struct RegistryCache {
    registry: Arc<dyn Registry>,
    ttl: Option<Duration>,
    entries: Arc<Entries>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RegistryCache {
    pub fn new(registry: Arc<dyn Registry>, ttl: Option<Duration>) -> Self {
        Self {
            registry,
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
            inflight: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Periodically evict entries in a background task
    ///
    /// An entry is evicted once it is older than the TTL plus `max_stale`, so
    /// expired entries stay available as a fallback for that long. Needs a TTL
    /// and a running tokio runtime; otherwise this is a no-op.
    pub fn with_sweeper(self, interval: Duration, max_stale: Duration) -> Self {
        let Some(ttl) = self.ttl else {
            return self;
        };
        if interval.is_zero() {
            tracing::warn!("Zero sweep interval, registry cache sweeper not started");
            return self;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime, registry cache sweeper not started");
            return self;
        };

        let lifetime = ttl.saturating_add(max_stale);
        let handle = runtime.spawn(sweep(Arc::downgrade(&self.entries), lifetime, interval));
        *self.sweeper.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cached instances and whether they are still fresh
    fn cached(&self, name: &str) -> Option<(bool, Vec<ServiceInstance>)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(name)
            .map(|entry| (entry.is_fresh(self.ttl), entry.instances.clone()))
    }

    fn inflight_gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(inflight.entry(name.to_string()).or_default())
    }

    /// Drop the gate for `name` once no other caller holds a handle to it
    fn release_gate(&self, name: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one held here
        if Arc::strong_count(&gate) == 2 {
            inflight.remove(name);
        }
    }

    /// Return the instances registered under `name`, from cache when fresh
    pub async fn lookup(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        if let Some((true, instances)) = self.cached(name) {
            tracing::trace!(service = %name, "Registry cache hit");
            return Ok(instances);
        }

        let gate = self.inflight_gate(name);
        let result = {
            let _guard = gate.lock().await;
            self.refresh(name).await
        };
        self.release_gate(name, gate);
        result
    }

    /// Query the registry for `name` unless a concurrent caller already did
    async fn refresh(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let stale = match self.cached(name) {
            Some((true, instances)) => {
                tracing::trace!(service = %name, "Registry cache filled by concurrent lookup");
                return Ok(instances);
            }
            Some((false, instances)) => Some(instances),
            None => None,
        };

        tracing::debug!(
            service = %name,
            registry = self.registry.name(),
            expired = stale.is_some(),
            "Registry cache miss, querying registry"
        );

        match self.registry.get_service(name).await {
            Ok(instances) => {
                let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
                entries.insert(name.to_string(), CacheEntry::new(instances.clone()));
                Ok(instances)
            }
            Err(err) if err.is_not_found() => {
                self.invalidate(name);
                Err(err)
            }
            Err(err) => match stale {
                Some(instances) => {
                    tracing::warn!(
                        service = %name,
                        error = %err,
                        "Registry refresh failed, serving stale entry"
                    );
                    Ok(instances)
                }
                None => Err(err),
            },
        }
    }

    /// Drop the cached entry for one service
    pub fn invalidate(&self, name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(name);
    }

    /// Diagnostic snapshot of every cached service, sorted by name
    pub fn entries(&self) -> Vec<CacheSnapshot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<CacheSnapshot> = entries
            .iter()
            .map(|(service, entry)| CacheSnapshot {
                service: service.clone(),
                instances: entry.instances.len(),
                nodes: entry.instances.iter().map(|i| i.nodes.len()).sum(),
                fetched_at: entry.fetched_at,
                fresh: entry.is_fresh(self.ttl),
            })
            .collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Halt the background sweeper and drop all entries
    pub fn stop(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "Registry cache stopped");
    }
}

impl Drop for RegistryCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

async fn sweep(entries: Weak<Entries>, lifetime: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let evicted = purge_older_than(&entries, lifetime);
        if evicted > 0 {
            tracing::debug!(evicted, "Swept expired registry cache entries");
        }
    }
}

fn purge_older_than(entries: &Entries, lifetime: Duration) -> usize {
    let mut entries = entries.write().unwrap_or_else(|e| e.into_inner());
    let before = entries.len();
    entries.retain(|_, entry| entry.is_fresh(Some(lifetime)));
    before - entries.len()
}

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use taskdeck_gateway::Result;
use taskdeck_protocol::{CacheMetadata, HierarchyLevel};
use tokio::time::Instant;

/// Cache key for one concrete listing: a level plus the identifier of the
/// containing scope (none for workspaces). Listings are never aggregated
/// across scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub level: HierarchyLevel,
    pub parent: Option<String>,
}

impl ScopeKey {
    pub fn new(level: HierarchyLevel, parent: Option<&str>) -> Self {
        Self {
            level,
            parent: parent.map(str::to_string),
        }
    }

    pub fn scope_id(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}:{parent}", self.level),
            None => self.level.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedListing {
    items: Vec<Value>,
    fetched_wall: SystemTime,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Options for a single `ensure` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureOptions {
    pub force_refresh: bool,
}

/// TTL-scoped cache of hierarchy listings. One instance per session; a TTL
/// of zero disables caching entirely.
pub struct HierarchyDirectory {
    ttl: Duration,
    entries: Mutex<HashMap<ScopeKey, CachedListing>>,
}

impl HierarchyDirectory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serve the listing for `(level, parent)` from cache when fresh,
    /// otherwise call `fetch` and cache its result. Nothing is cached when
    /// the fetch fails.
    pub async fn ensure<F, Fut>(
        &self,
        level: HierarchyLevel,
        parent: Option<&str>,
        fetch: F,
        options: EnsureOptions,
    ) -> Result<(Vec<Value>, CacheMetadata)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let key = ScopeKey::new(level, parent);
        if !options.force_refresh && !self.ttl.is_zero() {
            // lock is released before any await
            let hit = {
                let entries = self.entries.lock().expect("hierarchy cache poisoned");
                entries
                    .get(&key)
                    .filter(|entry| Instant::now() <= entry.expires_at)
                    .cloned()
            };
            if let Some(entry) = hit {
                log::debug!(
                    "hierarchy cache hit for {} ({} items)",
                    key.scope_id(),
                    entry.items.len()
                );
                let metadata = self.metadata_for(&key, &entry);
                return Ok((entry.items, metadata));
            }
        }

        let items = fetch().await?;
        let now = Instant::now();
        let entry = CachedListing {
            items: items.clone(),
            fetched_wall: SystemTime::now(),
            fetched_at: now,
            expires_at: now + self.ttl,
        };
        let metadata = self.metadata_for(&key, &entry);
        if !self.ttl.is_zero() {
            self.entries
                .lock()
                .expect("hierarchy cache poisoned")
                .insert(key, entry);
        }
        Ok((items, metadata))
    }

    /// Drop the listing for one concrete `(level, parent)` pair. A missing
    /// entry is a no-op.
    pub fn invalidate(&self, level: HierarchyLevel, parent: Option<&str>) {
        let key = ScopeKey::new(level, parent);
        let removed = self
            .entries
            .lock()
            .expect("hierarchy cache poisoned")
            .remove(&key)
            .is_some();
        if removed {
            log::debug!("invalidated {} listing", key.scope_id());
        }
    }

    /// Drop every cached listing at one level.
    pub fn invalidate_level(&self, level: HierarchyLevel) {
        self.entries
            .lock()
            .expect("hierarchy cache poisoned")
            .retain(|key, _| key.level != level);
    }

    pub fn invalidate_all(&self) {
        self.entries
            .lock()
            .expect("hierarchy cache poisoned")
            .clear();
    }

    pub fn cached_scopes(&self) -> usize {
        self.entries.lock().expect("hierarchy cache poisoned").len()
    }

    fn metadata_for(&self, key: &ScopeKey, entry: &CachedListing) -> CacheMetadata {
        let age = Instant::now().saturating_duration_since(entry.fetched_at);
        CacheMetadata::from_fetch(
            key.scope_id(),
            entry.fetched_wall,
            age,
            self.ttl,
            entry.items.len(),
        )
    }
}

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, SystemTime};
use taskdeck_gateway::Result;
use taskdeck_protocol::CacheMetadata;
use taskdeck_resolver::TaskIndex;
use tokio::time::Instant;

/// Per-table TTLs; zero disables the table.
#[derive(Debug, Clone, Copy)]
pub struct CatalogueTtls {
    pub task: Duration,
    pub list_page: Duration,
    pub search: Duration,
}

impl Default for CatalogueTtls {
    fn default() -> Self {
        Self {
            task: Duration::from_millis(120_000),
            list_page: Duration::from_millis(60_000),
            search: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedRecord {
    value: Value,
    expires_at: Instant,
}

/// One cached page of a list's tasks, with a fuzzy index over the page
/// built at most once and shared by repeated name lookups.
pub struct ListPage {
    items: Vec<Value>,
    fetched_wall: SystemTime,
    fetched_at: Instant,
    expires_at: Instant,
    index: OnceLock<TaskIndex>,
}

impl ListPage {
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn task_index(&self) -> &TaskIndex {
        self.index.get_or_init(|| TaskIndex::from_raw(&self.items))
    }
}

/// Cache key for one page of a list listing. Filters participate in the
/// key so differently-filtered pages never alias; `serde_json` serializes
/// object keys in sorted order, which keeps the encoding canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListPageKey {
    pub list_id: String,
    pub filters: String,
    pub page: u32,
}

impl ListPageKey {
    pub fn new(list_id: &str, filters: &Value, page: u32) -> Self {
        Self {
            list_id: list_id.to_string(),
            filters: filters.to_string(),
            page,
        }
    }
}

/// Cache key for a workspace-scoped search result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub scope_id: String,
    pub params: String,
}

impl SearchKey {
    pub fn new(scope_id: &str, params: &Value) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            params: params.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSearch {
    items: Vec<Value>,
    fetched_wall: SystemTime,
    fetched_at: Instant,
    expires_at: Instant,
}

/// TTL cache of task records, list pages, and search result sets. The
/// three tables are independent; mutation use-cases call the subset of
/// invalidation hooks relevant to what they touched.
pub struct RecordCatalogue {
    ttls: CatalogueTtls,
    tasks: Mutex<HashMap<String, CachedRecord>>,
    pages: Mutex<HashMap<ListPageKey, Arc<ListPage>>>,
    searches: Mutex<HashMap<SearchKey, CachedSearch>>,
}

impl RecordCatalogue {
    pub fn new(ttls: CatalogueTtls) -> Self {
        Self {
            ttls,
            tasks: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            searches: Mutex::new(HashMap::new()),
        }
    }

    /// Task record by id, fetched on miss. Nothing is cached on failure.
    pub async fn ensure_task<F, Fut>(&self, task_id: &str, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let ttl = self.ttls.task;
        if !ttl.is_zero() {
            let hit = {
                let tasks = self.tasks.lock().expect("task cache poisoned");
                tasks
                    .get(task_id)
                    .filter(|entry| Instant::now() <= entry.expires_at)
                    .map(|entry| entry.value.clone())
            };
            if let Some(value) = hit {
                log::debug!("task cache hit for {task_id}");
                return Ok(value);
            }
        }
        let value = fetch().await?;
        if !ttl.is_zero() {
            self.tasks.lock().expect("task cache poisoned").insert(
                task_id.to_string(),
                CachedRecord {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
        Ok(value)
    }

    /// One page of a list's tasks, fetched on miss. The returned page is
    /// shared so its lazily-built fuzzy index survives across lookups.
    pub async fn ensure_list_page<F, Fut>(
        &self,
        key: ListPageKey,
        fetch: F,
    ) -> Result<(Arc<ListPage>, CacheMetadata)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let ttl = self.ttls.list_page;
        let scope_id = format!("list:{}#{}", key.list_id, key.page);
        if !ttl.is_zero() {
            let hit = {
                let pages = self.pages.lock().expect("list page cache poisoned");
                pages
                    .get(&key)
                    .filter(|page| Instant::now() <= page.expires_at)
                    .cloned()
            };
            if let Some(page) = hit {
                let metadata = page_metadata(&scope_id, &page, ttl);
                return Ok((page, metadata));
            }
        }
        let items = fetch().await?;
        let now = Instant::now();
        let page = Arc::new(ListPage {
            items,
            fetched_wall: SystemTime::now(),
            fetched_at: now,
            expires_at: now + ttl,
            index: OnceLock::new(),
        });
        let metadata = page_metadata(&scope_id, &page, ttl);
        if !ttl.is_zero() {
            self.pages
                .lock()
                .expect("list page cache poisoned")
                .insert(key, Arc::clone(&page));
        }
        Ok((page, metadata))
    }

    /// Search result set by scope + params, fetched on miss.
    pub async fn ensure_search<F, Fut>(
        &self,
        key: SearchKey,
        fetch: F,
    ) -> Result<(Vec<Value>, CacheMetadata)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let ttl = self.ttls.search;
        let scope_id = format!("search:{}", key.scope_id);
        if !ttl.is_zero() {
            let hit = {
                let searches = self.searches.lock().expect("search cache poisoned");
                searches
                    .get(&key)
                    .filter(|entry| Instant::now() <= entry.expires_at)
                    .cloned()
            };
            if let Some(entry) = hit {
                let age = Instant::now().saturating_duration_since(entry.fetched_at);
                let metadata = CacheMetadata::from_fetch(
                    scope_id,
                    entry.fetched_wall,
                    age,
                    ttl,
                    entry.items.len(),
                );
                return Ok((entry.items, metadata));
            }
        }
        let items = fetch().await?;
        let now = Instant::now();
        let entry = CachedSearch {
            items: items.clone(),
            fetched_wall: SystemTime::now(),
            fetched_at: now,
            expires_at: now + ttl,
        };
        let metadata = CacheMetadata::from_fetch(scope_id, entry.fetched_wall, Duration::ZERO, ttl, entry.items.len());
        if !ttl.is_zero() {
            self.searches
                .lock()
                .expect("search cache poisoned")
                .insert(key, entry);
        }
        Ok((items, metadata))
    }

    /// Drop the cached record for one task. Missing entries are a no-op.
    pub fn invalidate_task(&self, task_id: &str) {
        self.tasks
            .lock()
            .expect("task cache poisoned")
            .remove(task_id);
    }

    /// Drop every cached page of one list.
    pub fn invalidate_list(&self, list_id: &str) {
        self.pages
            .lock()
            .expect("list page cache poisoned")
            .retain(|key, _| key.list_id != list_id);
    }

    /// Drop every cached search result set.
    pub fn invalidate_search(&self) {
        self.searches
            .lock()
            .expect("search cache poisoned")
            .clear();
    }

    pub fn cached_tasks(&self) -> usize {
        self.tasks.lock().expect("task cache poisoned").len()
    }

    pub fn cached_pages(&self) -> usize {
        self.pages.lock().expect("list page cache poisoned").len()
    }

    pub fn cached_searches(&self) -> usize {
        self.searches.lock().expect("search cache poisoned").len()
    }
}

fn page_metadata(scope_id: &str, page: &ListPage, ttl: Duration) -> CacheMetadata {
    let age = Instant::now().saturating_duration_since(page.fetched_at);
    CacheMetadata::from_fetch(scope_id, page.fetched_wall, age, ttl, page.items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalogue() -> RecordCatalogue {
        RecordCatalogue::new(CatalogueTtls {
            task: Duration::from_millis(1_000),
            list_page: Duration::from_millis(1_000),
            search: Duration::from_millis(500),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn task_reads_hit_cache_until_invalidated() {
        let catalogue = catalogue();
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"id": "86dt2abc", "name": "Ship"}))
        };

        catalogue.ensure_task("86dt2abc", fetch).await.expect("miss");
        catalogue.ensure_task("86dt2abc", fetch).await.expect("hit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        catalogue.invalidate_task("86dt2abc");
        catalogue.ensure_task("86dt2abc", fetch).await.expect("refetch");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn list_page_index_is_built_once_and_dropped_with_page() {
        let catalogue = catalogue();
        let key = ListPageKey::new("901", &json!({"archived": false}), 0);
        let (page, meta) = catalogue
            .ensure_list_page(key.clone(), || async {
                Ok(vec![
                    json!({"id": "86dt2abc", "name": "Ship the release"}),
                    json!({"id": "86dt2abd", "name": "Write changelog"}),
                ])
            })
            .await
            .expect("fetch page");
        assert_eq!(meta.total_items, 2);

        let first = page.task_index() as *const _;
        let (page_again, _) = catalogue
            .ensure_list_page(key, || async { unreachable!("cached") })
            .await
            .expect("cached page");
        let second = page_again.task_index() as *const _;
        assert_eq!(first, second);

        catalogue.invalidate_list("901");
        assert_eq!(catalogue.cached_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn filters_and_page_number_key_separately() {
        let catalogue = catalogue();
        let calls = AtomicUsize::new(0);
        for (filters, page) in [
            (json!({"archived": false}), 0),
            (json!({"archived": true}), 0),
            (json!({"archived": false}), 1),
        ] {
            catalogue
                .ensure_list_page(ListPageKey::new("901", &filters, page), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![])
                })
                .await
                .expect("fetch");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(catalogue.cached_pages(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn search_results_expire_on_their_own_ttl() {
        let catalogue = catalogue();
        let calls = AtomicUsize::new(0);
        let key = || SearchKey::new("ws-1", &json!({"query": "release"}));
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({"id": "86dt2abc"})])
        };

        catalogue.ensure_search(key(), fetch).await.expect("miss");
        tokio::time::advance(Duration::from_millis(400)).await;
        catalogue.ensure_search(key(), fetch).await.expect("hit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(200)).await;
        catalogue.ensure_search(key(), fetch).await.expect("expired");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        catalogue.invalidate_search();
        assert_eq!(catalogue.cached_searches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_table_never_caches() {
        let catalogue = RecordCatalogue::new(CatalogueTtls {
            task: Duration::ZERO,
            ..CatalogueTtls::default()
        });
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            catalogue
                .ensure_task("86dt2abc", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": "86dt2abc"}))
                })
                .await
                .expect("fetch");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(catalogue.cached_tasks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_fetch_caches_nothing() {
        let catalogue = catalogue();
        let key = SearchKey::new("ws-1", &json!({}));
        catalogue
            .ensure_search(key.clone(), || async {
                Err(taskdeck_gateway::GatewayError::RateLimited("slow down".into()))
            })
            .await
            .expect_err("fetch fails");
        assert_eq!(catalogue.cached_searches(), 0);
    }
}

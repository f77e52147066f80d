use std::collections::BTreeSet;
use std::time::Duration;
use taskdeck_directory::CatalogueTtls;
use taskdeck_gate::{WriteAccessConfig, WriteAccessMode};

const DEFAULT_HIERARCHY_TTL_MS: u64 = 60_000;
const DEFAULT_BULK_CONCURRENCY: usize = 3;
const MAX_BULK_CONCURRENCY: usize = 10;
const DEFAULT_FUZZY_LIMIT: usize = 10;
const MAX_FUZZY_LIMIT: usize = 50;

/// Per-session tuning consumed from the environment. A TTL of zero
/// disables the corresponding cache.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub hierarchy_ttl: Duration,
    pub catalogue_ttls: CatalogueTtls,
    pub bulk_concurrency: usize,
    pub fuzzy_limit: usize,
    pub write_access: WriteAccessConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hierarchy_ttl: Duration::from_millis(DEFAULT_HIERARCHY_TTL_MS),
            catalogue_ttls: CatalogueTtls::default(),
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            fuzzy_limit: DEFAULT_FUZZY_LIMIT,
            write_access: WriteAccessConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CatalogueTtls::default();
        let catalogue_ttls = CatalogueTtls {
            task: parse_ttl_ms(lookup("TASKDECK_TASK_TTL_MS").as_deref(), defaults.task),
            list_page: parse_ttl_ms(
                lookup("TASKDECK_LIST_PAGE_TTL_MS").as_deref(),
                defaults.list_page,
            ),
            search: parse_ttl_ms(lookup("TASKDECK_SEARCH_TTL_MS").as_deref(), defaults.search),
        };
        let write_access = WriteAccessConfig {
            mode: parse_mode(lookup("TASKDECK_WRITE_ACCESS").as_deref()),
            allowed_spaces: parse_id_set(lookup("TASKDECK_ALLOWED_SPACES").as_deref()),
            allowed_lists: parse_id_set(lookup("TASKDECK_ALLOWED_LISTS").as_deref()),
            ..WriteAccessConfig::default()
        };
        Self {
            hierarchy_ttl: parse_ttl_ms(
                lookup("TASKDECK_HIERARCHY_TTL_MS").as_deref(),
                Duration::from_millis(DEFAULT_HIERARCHY_TTL_MS),
            ),
            catalogue_ttls,
            bulk_concurrency: parse_clamped(
                lookup("TASKDECK_BULK_CONCURRENCY").as_deref(),
                DEFAULT_BULK_CONCURRENCY,
                1,
                MAX_BULK_CONCURRENCY,
            ),
            fuzzy_limit: parse_clamped(
                lookup("TASKDECK_FUZZY_LIMIT").as_deref(),
                DEFAULT_FUZZY_LIMIT,
                1,
                MAX_FUZZY_LIMIT,
            ),
            write_access,
        }
    }
}

fn parse_ttl_ms(raw: Option<&str>, default_value: Duration) -> Duration {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default_value)
}

fn parse_clamped(raw: Option<&str>, default_value: usize, minimum: usize, maximum: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(minimum, maximum)
}

fn parse_mode(raw: Option<&str>) -> WriteAccessMode {
    match raw.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("closed") => WriteAccessMode::Closed,
        Some(v) if v.eq_ignore_ascii_case("selective") => WriteAccessMode::Selective,
        _ => WriteAccessMode::Open,
    }
}

fn parse_id_set(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Staleness metadata surfaced alongside cached listings. Observability
/// only; correctness never depends on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetadata {
    pub scope_id: String,
    pub last_fetched: String,
    pub age_ms: u64,
    pub expires_at: String,
    pub ttl_ms: u64,
    pub stale: bool,
    pub total_items: usize,
}

impl CacheMetadata {
    pub fn from_fetch(
        scope_id: impl Into<String>,
        fetched: SystemTime,
        age: Duration,
        ttl: Duration,
        total_items: usize,
    ) -> Self {
        let age_ms = clamped_ms(age);
        let ttl_ms = clamped_ms(ttl);
        let fetched_utc: DateTime<Utc> = fetched.into();
        let expires_utc = fetched_utc + chrono::Duration::milliseconds(ttl_ms.min(i64::MAX as u64) as i64);
        Self {
            scope_id: scope_id.into(),
            last_fetched: fetched_utc.to_rfc3339_opts(SecondsFormat::Millis, true),
            age_ms,
            expires_at: expires_utc.to_rfc3339_opts(SecondsFormat::Millis, true),
            ttl_ms,
            stale: age_ms > ttl_ms,
            total_items,
        }
    }
}

fn clamped_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

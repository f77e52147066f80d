use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::SystemTime;

/// Outcome of the latest probe of an optional upstream endpoint.
/// Overwritten on every probe, never appended.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRecord {
    pub available: bool,
    pub last_checked: SystemTime,
    pub diagnostics: Option<String>,
}

/// Remembers which optional endpoints answered for which scope so a
/// degraded endpoint is not probed again on every call.
#[derive(Default)]
pub struct CapabilityRegistry {
    records: Mutex<HashMap<String, CapabilityRecord>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, key: &str) -> Option<CapabilityRecord> {
        self.records
            .lock()
            .expect("capability registry poisoned")
            .get(key)
            .cloned()
    }

    pub fn record(&self, key: &str, available: bool, diagnostics: Option<String>) {
        self.records
            .lock()
            .expect("capability registry poisoned")
            .insert(
                key.to_string(),
                CapabilityRecord {
                    available,
                    last_checked: SystemTime::now(),
                    diagnostics,
                },
            );
    }

    /// Two-variant dispatch: try the direct endpoint unless it is
    /// known-unavailable, remember the outcome, and fall back to the scan
    /// variant on failure. A failing probe is recorded, not propagated.
    pub async fn dispatch<T, D, DF, S, SF>(&self, key: &str, direct: D, fallback: S) -> Result<T>
    where
        D: FnOnce() -> DF,
        DF: Future<Output = Result<T>>,
        S: FnOnce() -> SF,
        SF: Future<Output = Result<T>>,
    {
        let known_unavailable = self.snapshot(key).is_some_and(|r| !r.available);
        if !known_unavailable {
            match direct().await {
                Ok(value) => {
                    self.record(key, true, None);
                    return Ok(value);
                }
                Err(err) => {
                    log::debug!("direct endpoint {key} unavailable, falling back: {err}");
                    self.record(key, false, Some(err.to_string()));
                }
            }
        }
        fallback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn dispatch_prefers_direct_and_records_success() {
        let registry = CapabilityRegistry::new();
        let value = registry
            .dispatch("docs:ws-1", || async { Ok(1) }, || async { Ok(2) })
            .await
            .expect("dispatch");
        assert_eq!(value, 1);
        assert!(registry.snapshot("docs:ws-1").expect("record").available);
    }

    #[tokio::test]
    async fn dispatch_falls_back_and_marks_unavailable() {
        let registry = CapabilityRegistry::new();
        let value = registry
            .dispatch(
                "docs:ws-1",
                || async {
                    Err(GatewayError::Upstream {
                        status: 404,
                        message: "no such route".into(),
                    })
                },
                || async { Ok(7) },
            )
            .await
            .expect("fallback");
        assert_eq!(value, 7);
        let record = registry.snapshot("docs:ws-1").expect("record");
        assert!(!record.available);
        assert!(record.diagnostics.as_deref().unwrap_or("").contains("404"));
    }

    #[tokio::test]
    async fn dispatch_skips_known_unavailable_endpoint() {
        let registry = CapabilityRegistry::new();
        registry.record("docs:ws-1", false, Some("probe failed".into()));
        let direct_calls = AtomicUsize::new(0);
        let value = registry
            .dispatch(
                "docs:ws-1",
                || {
                    direct_calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(1) }
                },
                || async { Ok(2) },
            )
            .await
            .expect("fallback");
        assert_eq!(value, 2);
        assert_eq!(direct_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn probe_records_are_overwritten() {
        let registry = CapabilityRegistry::new();
        registry.record("docs:ws-1", false, Some("down".into()));
        registry.record("docs:ws-1", true, None);
        let record = registry.snapshot("docs:ws-1").expect("record");
        assert!(record.available);
        assert_eq!(record.diagnostics, None);
    }
}

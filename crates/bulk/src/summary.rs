use crate::engine::BulkOutcome;
use serde::Serialize;

/// Outcomes beyond this many are summarized, not echoed back.
pub const PREVIEW_LIMIT: usize = 20;
const GUIDANCE_INDEX_LIMIT: usize = 10;

/// Aggregate view of a bulk run. Partial failure is reported here, never
/// raised as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkSummary<P> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
    pub failed_indices: Vec<usize>,
    pub preview: Vec<BulkOutcome<P>>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// Aggregate per-item outcomes; `operation` names the bulk use-case for
/// the completion log line.
pub fn summarize<P: Clone>(operation: &str, outcomes: &[BulkOutcome<P>]) -> BulkSummary<P> {
    let total = outcomes.len();
    let failed_indices: Vec<usize> = outcomes
        .iter()
        .filter(|o| !o.succeeded())
        .map(|o| o.index)
        .collect();
    let failed = failed_indices.len();
    let succeeded = total - failed;
    let first_error = outcomes
        .iter()
        .find_map(|o| o.error.clone());

    let guidance = if failed > 0 {
        let shown: Vec<String> = failed_indices
            .iter()
            .take(GUIDANCE_INDEX_LIMIT)
            .map(ToString::to_string)
            .collect();
        let suffix = if failed > GUIDANCE_INDEX_LIMIT { ", ..." } else { "" };
        Some(format!(
            "{failed} of {total} items failed (indices {}{suffix}); successful items were applied and do not need to be retried",
            shown.join(", ")
        ))
    } else {
        None
    };

    log::info!("{operation} completed: {succeeded} succeeded, {failed} failed, {total} total");

    BulkSummary {
        total,
        succeeded,
        failed,
        first_error,
        failed_indices,
        preview: outcomes.iter().take(PREVIEW_LIMIT).cloned().collect(),
        truncated: total > PREVIEW_LIMIT,
        guidance,
    }
}

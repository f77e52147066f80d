mod engine;
mod summary;

pub use engine::{BulkEngine, BulkOutcome, OutcomeStatus};
pub use summary::{summarize, BulkSummary, PREVIEW_LIMIT};

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Per-item outcome of a bulk run, restorable to input order via `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkOutcome<P> {
    pub index: usize,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<P> BulkOutcome<P> {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Runs independent mutations under a fixed concurrency cap. Worker errors
/// (and panics) become `failed` outcomes; a failing item never aborts or
/// skips the rest of the batch.
pub struct BulkEngine {
    concurrency: usize,
}

impl BulkEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Apply `worker` to every item with at most `concurrency` in flight.
    /// Outcomes come back in input order regardless of completion order.
    pub async fn run<I, P, W, Fut>(&self, items: Vec<I>, worker: W) -> Vec<BulkOutcome<P>>
    where
        I: Send + 'static,
        P: Send + 'static,
        W: Fn(usize, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::new(worker);
        let handles: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let semaphore = Arc::clone(&semaphore);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .unwrap_or_else(|_| unreachable!("bulk semaphore closed"));
                    match worker(index, item).await {
                        Ok(payload) => BulkOutcome {
                            index,
                            status: OutcomeStatus::Success,
                            payload: Some(payload),
                            error: None,
                        },
                        Err(err) => BulkOutcome {
                            index,
                            status: OutcomeStatus::Failed,
                            payload: None,
                            error: Some(format!("{err:#}")),
                        },
                    }
                })
            })
            .collect();

        // handles are awaited in spawn order, so outcomes land in input
        // order no matter when each item completed
        let mut outcomes = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    log::warn!("bulk worker for item {index} aborted: {join_err}");
                    BulkOutcome {
                        index,
                        status: OutcomeStatus::Failed,
                        payload: None,
                        error: Some(format!("worker aborted: {join_err}")),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

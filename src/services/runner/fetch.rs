//! Parallel per-date fetching

use super::CycleRunner;
use crate::domain::types::{DateKey, RawQuote};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

impl CycleRunner {
    /// Fetch every date concurrently, bounded by `provider.concurrency`
    ///
    /// Results come back in ascending date order regardless of completion
    /// order. A timeout or a panicked task counts as a failed fetch.
    pub(crate) async fn fetch_all(
        &self,
        dates: &[DateKey],
    ) -> Vec<(DateKey, anyhow::Result<Vec<RawQuote>>)> {
        let permits = Arc::new(Semaphore::new(self.config.provider_concurrency().max(1)));
        let timeout = Duration::from_millis(self.config.provider_timeout_ms());
        let mut tasks = JoinSet::new();

        for &date in dates {
            let query = self.query_for(date);
            let provider = self.provider.clone();
            let permits = permits.clone();
            let metrics = self.metrics.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let start = Instant::now();
                let result = match tokio::time::timeout(timeout, provider.fetch(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("fetch timed out after {} ms", timeout.as_millis())),
                };
                let latency_ms = start.elapsed().as_millis() as u64;
                metrics.record_fetch(latency_ms, result.is_ok());
                debug!(date = %date, latency_ms = %latency_ms, ok = %result.is_ok(), "fetch_finished");
                (date, result)
            });
        }

        let mut results = Vec::with_capacity(dates.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => error!(error = %e, "fetch_task_failed"),
            }
        }

        // Dates whose task died never reported; treat them as failed
        for &date in dates {
            if !results.iter().any(|(d, _)| *d == date) {
                self.metrics.record_fetch(0, false);
                results.push((date, Err(anyhow!("fetch task aborted"))));
            }
        }

        results.sort_by_key(|(date, _)| *date);
        results
    }
}

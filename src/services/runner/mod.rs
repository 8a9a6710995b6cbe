//! Cycle orchestration
//!
//! The CycleRunner executes one complete fetch/detect/notify pass:
//! - Fetch quotes for every tracked date in parallel (bounded, with timeout)
//! - Normalize and aggregate into per-date snapshots
//! - Detect drops against the ledger, then flush it
//! - Dispatch one report when drops exist
//! - Journal the cycle report and update metrics

mod display;
mod fetch;
#[cfg(test)]
mod tests;

use crate::domain::cycle::CycleReport;
use crate::domain::types::{DateKey, FareQuery, FareQuote};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::journal::CycleJournal;
use crate::io::notifier::Notifier;
use crate::io::provider::FareProvider;
use crate::services::aggregator::Aggregator;
use crate::services::detector::DropDetector;
use crate::services::dispatcher::Dispatcher;
use crate::services::ledger::PriceLedger;
use crate::services::normalizer::QuoteNormalizer;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs tracking cycles against one provider and one ledger
pub struct CycleRunner {
    pub(crate) config: Config,
    pub(crate) provider: Arc<dyn FareProvider>,
    pub(crate) normalizer: QuoteNormalizer,
    pub(crate) aggregator: Aggregator,
    pub(crate) detector: DropDetector,
    /// Single writer of per-date floors
    pub(crate) ledger: PriceLedger,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) journal: CycleJournal,
    pub(crate) metrics: Arc<Metrics>,
    /// Consecutive failed fetches per date
    pub(crate) failure_streaks: FxHashMap<DateKey, u32>,
}

impl CycleRunner {
    pub fn new(
        config: Config,
        provider: Arc<dyn FareProvider>,
        ledger: PriceLedger,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            normalizer: QuoteNormalizer::from_config(&config),
            aggregator: Aggregator::new(config.top_n()),
            detector: DropDetector::new(),
            dispatcher: Dispatcher::from_config(&config, notifier),
            journal: CycleJournal::new(config.journal_file()),
            provider,
            ledger,
            metrics,
            failure_streaks: FxHashMap::default(),
            config,
        }
    }

    pub fn ledger(&self) -> &PriceLedger {
        &self.ledger
    }

    /// Dates to query this cycle, ascending
    pub fn tracked_dates(&self) -> Vec<DateKey> {
        let dates = DateKey::range_inclusive(self.config.start_date(), self.config.end_date());
        if !self.config.skip_past_dates() {
            return dates;
        }
        let today = DateKey::new(chrono::Utc::now().date_naive());
        dates.into_iter().filter(|d| *d >= today).collect()
    }

    fn query_for(&self, date: DateKey) -> FareQuery {
        FareQuery {
            date,
            origin: self.config.origin().to_string(),
            destination: self.config.destination().to_string(),
            passengers: self.config.passengers(),
            cabin: self.config.cabin(),
            trip: self.config.trip(),
        }
    }

    /// Run one complete cycle and return its report
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::new();
        let dates = self.tracked_dates();
        report.dates_requested = dates.len();

        info!(
            cid = %report.cid,
            route = %self.config.route_label(),
            dates = %dates.len(),
            provider = %self.provider.name(),
            "cycle_started"
        );

        // Fetch: per-date failures degrade to zero quotes
        let fetched = self.fetch_all(&dates).await;
        let mut quotes: Vec<FareQuote> = Vec::new();
        for (date, result) in fetched {
            match result {
                Ok(raws) => {
                    self.failure_streaks.remove(&date);
                    let batch = self.normalizer.normalize_all(date, &raws);
                    report.quotes_accepted += batch.quotes.len();
                    report.quotes_rejected += batch.rejected;
                    if batch.quotes.is_empty() {
                        info!(date = %date, raw = %raws.len(), "no_usable_quotes");
                    }
                    quotes.extend(batch.quotes);
                }
                Err(e) => {
                    warn!(date = %date, error = %format!("{:#}", e), "fetch_failed");
                    report.fetch_failures.push(date);
                    self.record_fetch_failure(date);
                }
            }
        }
        self.metrics.record_quotes(report.quotes_accepted as u64, report.quotes_rejected as u64);

        // Aggregate and detect in date order
        let snapshots = self.aggregator.aggregate(quotes);
        report.dates_quoted = snapshots.len();

        let detection = self.detector.detect(&snapshots, &self.ledger).await;
        if let Some(ref e) = detection.ledger_error {
            self.metrics.record_ledger_error();
            report.ledger_error = Some(format!("{:#}", e));
        }
        if let Err(e) = self.ledger.flush().await {
            error!(cid = %report.cid, error = %format!("{:#}", e), "ledger_flush_failed");
            self.metrics.record_ledger_error();
            report.ledger_error.get_or_insert_with(|| format!("{:#}", e));
        }
        self.metrics.record_detection(detection.first_seen() as u64, detection.drops.len() as u64);

        self.display(&snapshots, &detection.outcomes).await;

        // Notify once per cycle, only for persisted drops
        if detection.has_drops() {
            let sent = self.dispatcher.dispatch(&detection.drops).await;
            self.metrics.record_notification(sent);
            report.notified = sent;
        }

        match self.ledger.entries().await {
            Ok(entries) => self.metrics.set_tracked_dates(entries.len() as u64),
            Err(e) => warn!(error = %e, "ledger_entries_failed"),
        }

        report.outcomes = detection.outcomes;
        report.drops = detection.drops;
        report.finish();
        self.journal.write_report(&report);
        self.metrics.record_cycle(report.duration_ms(), report.finished_at);

        info!(
            cid = %report.cid,
            duration_ms = %report.duration_ms(),
            dates_quoted = %report.dates_quoted,
            fetch_failures = %report.fetch_failures.len(),
            drops = %report.drops.len(),
            notified = %report.notified,
            "cycle_completed"
        );

        report
    }

    /// Bump a date's failure streak, escalating once when it hits the threshold
    fn record_fetch_failure(&mut self, date: DateKey) {
        let streak = self.failure_streaks.entry(date).or_insert(0);
        *streak += 1;

        let threshold = self.config.fetch_failure_threshold();
        if threshold > 0 && *streak == threshold {
            error!(
                date = %date,
                consecutive_failures = %streak,
                route = %self.config.route_label(),
                "fetch_failure_streak"
            );
            self.metrics.record_fetch_streak_alert();
        }
    }

    /// Make pending ledger writes durable (called on shutdown)
    pub async fn flush_ledger(&self) {
        if let Err(e) = self.ledger.flush().await {
            error!(error = %format!("{:#}", e), "ledger_flush_failed");
            self.metrics.record_ledger_error();
        }
    }
}

use super::*;
use crate::domain::types::{PriceChange, RawQuote};
use crate::io::notifier::Notification;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

fn key(s: &str) -> DateKey {
    s.parse().unwrap()
}

fn raw(price: &str) -> RawQuote {
    RawQuote {
        departure: "6:00 AM".to_string(),
        arrival: "8:10 AM".to_string(),
        stops: 0,
        price: price.to_string(),
        ..Default::default()
    }
}

/// Provider whose answers are set per date by the test
#[derive(Default)]
struct ScriptedProvider {
    quotes: Mutex<HashMap<DateKey, Vec<RawQuote>>>,
    failing: Mutex<HashSet<DateKey>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn set(&self, date: &str, prices: &[&str]) {
        self.quotes.lock().insert(key(date), prices.iter().map(|p| raw(p)).collect());
    }

    fn fail(&self, date: &str, failing: bool) {
        if failing {
            self.failing.lock().insert(key(date));
        } else {
            self.failing.lock().remove(&key(date));
        }
    }
}

#[async_trait]
impl FareProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, query: &FareQuery) -> anyhow::Result<Vec<RawQuote>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&query.date) {
            anyhow::bail!("upstream 503");
        }
        Ok(self.quotes.lock().get(&query.date).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("relay refused");
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

fn config(start: &str, end: &str) -> Config {
    Config::default().with_date_range(key(start), key(end)).with_journal_file("")
}

fn create_runner(
    config: Config,
    provider: Arc<ScriptedProvider>,
    notifier: Arc<RecordingNotifier>,
) -> CycleRunner {
    CycleRunner::new(config, provider, PriceLedger::in_memory(), notifier, Arc::new(Metrics::new()))
}

#[tokio::test]
async fn test_three_cycle_scenario() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-10"), provider.clone(), notifier.clone());

    // Cycle 1: first observation, recorded silently
    provider.set("2025-10-10", &["₹500", "₹700", "₹650"]);
    let report = runner.run_cycle().await;
    assert!(report.drops.is_empty());
    assert!(!report.notified);
    assert_eq!(report.outcomes[0].change, PriceChange::FirstSeen);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(500));
    assert!(notifier.sent.lock().is_empty());

    // Cycle 2: strictly lower
    provider.set("2025-10-10", &["₹500", "₹480", "₹600"]);
    let report = runner.run_cycle().await;
    assert_eq!(report.drops.len(), 1);
    assert_eq!(report.drops[0].old, Some(500));
    assert_eq!(report.drops[0].new, 480);
    assert!(report.notified);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(480));
    {
        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Previous Price: ₹500"));
        assert!(sent[0].body.contains("New Price: ₹480"));
        assert!(sent[0].body.contains("Savings: ₹20"));
    }

    // Cycle 3: higher than the floor
    provider.set("2025-10-10", &["₹490"]);
    let report = runner.run_cycle().await;
    assert!(report.drops.is_empty());
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(480));
    assert_eq!(notifier.sent.lock().len(), 1);
    assert_eq!(runner.metrics.cycles_total(), 3);
    assert_eq!(runner.metrics.drops_total(), 1);
}

#[tokio::test]
async fn test_fetch_failure_isolated_to_its_date() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-12"), provider.clone(), notifier.clone());

    provider.set("2025-10-10", &["₹500"]);
    provider.set("2025-10-11", &["₹600"]);
    provider.set("2025-10-12", &["₹700"]);
    runner.run_cycle().await;

    provider.set("2025-10-10", &["₹400"]);
    provider.fail("2025-10-11", true);
    provider.set("2025-10-12", &["₹650"]);
    let report = runner.run_cycle().await;

    assert_eq!(report.dates_requested, 3);
    assert_eq!(report.dates_quoted, 2);
    assert_eq!(report.fetch_failures, vec![key("2025-10-11")]);
    let dropped: Vec<DateKey> = report.drops.iter().map(|d| d.date).collect();
    assert_eq!(dropped, vec![key("2025-10-10"), key("2025-10-12")]);
    assert_eq!(runner.ledger().get(key("2025-10-11")).await.unwrap(), Some(600));
    assert_eq!(notifier.sent.lock().len(), 1);
    assert_eq!(runner.metrics.fetch_failures_total(), 1);
}

#[tokio::test]
async fn test_failure_streak_escalates_once() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = create_runner(
        config("2025-10-10", "2025-10-10").with_fetch_failure_threshold(2),
        provider.clone(),
        notifier.clone(),
    );

    provider.fail("2025-10-10", true);
    for _ in 0..4 {
        runner.run_cycle().await;
    }
    assert_eq!(runner.failure_streaks.get(&key("2025-10-10")), Some(&4));
    assert_eq!(runner.metrics.report().fetch_streak_alerts_total, 1);

    // Success resets the streak, so the next run of failures escalates again
    provider.fail("2025-10-10", false);
    provider.set("2025-10-10", &["₹500"]);
    runner.run_cycle().await;
    assert!(runner.failure_streaks.is_empty());

    provider.fail("2025-10-10", true);
    runner.run_cycle().await;
    runner.run_cycle().await;
    assert_eq!(runner.metrics.report().fetch_streak_alerts_total, 2);
    assert!(notifier.sent.lock().is_empty());
}

#[tokio::test]
async fn test_malformed_quotes_excluded() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-10"), provider.clone(), notifier.clone());

    provider.set("2025-10-10", &["Price unavailable", "₹5,300", "call us", "₹4,900", ""]);
    let report = runner.run_cycle().await;

    assert_eq!(report.quotes_accepted, 2);
    assert_eq!(report.quotes_rejected, 3);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(4900));
}

#[tokio::test]
async fn test_no_usable_quotes_leaves_date_untracked() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-10"), provider.clone(), notifier.clone());

    provider.set("2025-10-10", &["Price unavailable"]);
    let report = runner.run_cycle().await;

    assert_eq!(report.dates_quoted, 0);
    assert!(report.outcomes.is_empty());
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), None);
}

#[tokio::test]
async fn test_notifier_failure_keeps_ledger() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-10"), provider.clone(), notifier.clone());

    provider.set("2025-10-10", &["₹500"]);
    runner.run_cycle().await;
    provider.set("2025-10-10", &["₹450"]);
    let report = runner.run_cycle().await;

    assert_eq!(report.drops.len(), 1);
    assert!(!report.notified);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(450));
    assert_eq!(runner.metrics.notifications_failed_total(), 1);

    // Not re-notified next cycle
    let report = runner.run_cycle().await;
    assert!(report.drops.is_empty());
}

#[tokio::test]
async fn test_slow_fetch_times_out() {
    let provider = Arc::new(ScriptedProvider {
        delay: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    provider.set("2025-10-10", &["₹500"]);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = create_runner(
        config("2025-10-10", "2025-10-10").with_provider_timeout_ms(20),
        provider,
        notifier,
    );

    let report = runner.run_cycle().await;
    assert_eq!(report.fetch_failures, vec![key("2025-10-10")]);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), None);
}

#[tokio::test]
async fn test_fetch_results_in_date_order() {
    let provider = Arc::new(ScriptedProvider::default());
    for day in 10..=17 {
        provider.set(&format!("2025-10-{day}"), &["₹500"]);
    }
    let notifier = Arc::new(RecordingNotifier::default());
    let runner = create_runner(config("2025-10-10", "2025-10-17"), provider, notifier);

    let dates = runner.tracked_dates();
    let results = runner.fetch_all(&dates).await;
    let fetched: Vec<DateKey> = results.iter().map(|(d, _)| *d).collect();
    assert_eq!(fetched, dates);
    assert_eq!(fetched.len(), 8);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
}

#[tokio::test]
async fn test_multiplier_scales_prices() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = create_runner(
        config("2025-10-10", "2025-10-10").with_pricing(Some(100.0), 3),
        provider.clone(),
        notifier,
    );

    provider.set("2025-10-10", &["₹52"]);
    runner.run_cycle().await;
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(5200));
}

#[tokio::test]
async fn test_unchanged_cycle_lists_every_recorded_floor() {
    let provider = Arc::new(ScriptedProvider::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner =
        create_runner(config("2025-10-10", "2025-10-11"), provider.clone(), notifier.clone());

    provider.set("2025-10-11", &["₹600"]);
    provider.set("2025-10-10", &["₹500"]);
    runner.run_cycle().await;

    // Only one date quoted this time, and nothing changed
    provider.fail("2025-10-11", true);
    provider.set("2025-10-10", &["₹520"]);
    let report = runner.run_cycle().await;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].change, PriceChange::Unchanged);

    let floors = runner.recorded_floors(&report.outcomes).await;
    assert_eq!(floors, vec![(key("2025-10-10"), 500), (key("2025-10-11"), 600)]);
}

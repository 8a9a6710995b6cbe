//! End-to-end cycle tests: fixture provider, file or sqlite ledger, file notifier

use fare_watch::domain::types::{DateKey, PriceChange};
use fare_watch::infra::{Config, Metrics};
use fare_watch::io::{notifier, provider};
use fare_watch::services::{CycleRunner, PriceLedger};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

struct Workspace {
    _dir: TempDir,
    fixture: PathBuf,
    alerts: PathBuf,
    journal: PathBuf,
    ledger: PathBuf,
}

impl Workspace {
    fn new(ledger_file: &str) -> Self {
        let dir = tempdir().unwrap();
        Self {
            fixture: dir.path().join("quotes.json"),
            alerts: dir.path().join("out").join("alerts.jsonl"),
            journal: dir.path().join("out").join("cycles.jsonl"),
            ledger: dir.path().join("state").join(ledger_file),
            _dir: dir,
        }
    }

    fn config(&self, backend: &str, end_date: &str) -> Config {
        let toml = format!(
            r#"
[route]
origin = "BLR"
destination = "UDR"
start_date = "2025-10-10"
end_date = "{end_date}"

[provider]
kind = "fixture"
fixture_path = "{fixture}"
timeout_ms = 5000

[ledger]
backend = "{backend}"
path = "{ledger}"

[notifier]
kind = "file"
recipient = "traveller@example.com"
file = "{alerts}"

[journal]
file = "{journal}"

[alerts]
fetch_failure_threshold = 0
"#,
            fixture = self.fixture.display(),
            ledger = self.ledger.display(),
            alerts = self.alerts.display(),
            journal = self.journal.display(),
        );
        Config::from_toml_str(&toml).unwrap()
    }

    fn write_fixture(&self, json: &str) {
        fs::write(&self.fixture, json).unwrap();
    }

    async fn runner(&self, config: Config) -> CycleRunner {
        let ledger = PriceLedger::open(&config).await.unwrap();
        let provider = provider::from_config(&config).unwrap();
        let notifier = notifier::from_config(&config).unwrap();
        CycleRunner::new(config, provider, ledger, notifier, Arc::new(Metrics::new()))
    }
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    if !path.exists() {
        return Vec::new();
    }
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn key(s: &str) -> DateKey {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_scenario_with_file_ledger() {
    let ws = Workspace::new("lowest_prices.json");
    let config = ws.config("file", "2025-10-10");
    let mut runner = ws.runner(config.clone()).await;

    ws.write_fixture(
        r#"{"2025-10-10": [
            {"departure": "6:00 AM", "arrival": "8:10 AM", "stops": 0, "price": "₹500"},
            {"departure": "9:00 AM", "arrival": "11:00 AM", "stops": 0, "price": "₹700"},
            {"departure": "1:00 PM", "arrival": "3:30 PM", "stops": "1 stop", "price": "₹650"}
        ]}"#,
    );
    let report = runner.run_cycle().await;
    assert_eq!(report.outcomes[0].change, PriceChange::FirstSeen);
    assert!(read_lines(&ws.alerts).is_empty());
    assert!(ws.ledger.exists());

    ws.write_fixture(
        r#"{"2025-10-10": {"flights": [
            {"departure": "6:00 AM", "arrival": "8:10 AM", "stops": 0, "price": "₹500"},
            {"departure": "7:00 AM", "arrival": "9:10 AM", "stops": 0, "price": "₹480"},
            {"departure": "9:00 AM", "arrival": "11:00 AM", "stops": 0, "price": "₹600"}
        ]}}"#,
    );
    let report = runner.run_cycle().await;
    assert_eq!(report.drops.len(), 1);
    assert!(report.notified);

    let alerts = read_lines(&ws.alerts);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["to"], "traveller@example.com");
    assert_eq!(alerts[0]["subject"], "Flight Price Drop Alert - BLR to UDR");
    let body = alerts[0]["body"].as_str().unwrap();
    assert!(body.starts_with("Flight Price Drops Detected!"));
    assert!(body.contains("Date: 2025-10-10"));
    assert!(body.contains("Previous Price: ₹500"));
    assert!(body.contains("New Price: ₹480"));
    assert!(body.ends_with("Check your flight search for more details!"));

    ws.write_fixture(r#"{"2025-10-10": [{"price": "₹490"}]}"#);
    let report = runner.run_cycle().await;
    assert!(report.drops.is_empty());
    assert_eq!(read_lines(&ws.alerts).len(), 1);

    // A fresh process sees the persisted floor
    let restarted = ws.runner(config).await;
    assert_eq!(restarted.ledger().get(key("2025-10-10")).await.unwrap(), Some(480));

    let journal = read_lines(&ws.journal);
    assert_eq!(journal.len(), 3);
    assert_eq!(journal[1]["drops"][0]["old"], 500);
    assert_eq!(journal[1]["notified"], true);
}

#[tokio::test]
async fn test_restart_does_not_renotify() {
    let ws = Workspace::new("lowest_prices.db");
    let config = ws.config("sqlite", "2025-10-11");

    ws.write_fixture(r#"{"2025-10-10": [{"price": "₹5,300"}], "2025-10-11": [{"price": "₹6,100"}]}"#);
    {
        let mut runner = ws.runner(config.clone()).await;
        runner.run_cycle().await;
    }

    ws.write_fixture(r#"{"2025-10-10": [{"price": "₹4,800"}], "2025-10-11": [{"price": "₹6,100"}]}"#);
    {
        let mut runner = ws.runner(config.clone()).await;
        let report = runner.run_cycle().await;
        assert_eq!(report.drops.len(), 1);
        assert_eq!(report.drops[0].date, key("2025-10-10"));
    }

    // Same quotes after another restart: floor already lowered
    let mut runner = ws.runner(config).await;
    let report = runner.run_cycle().await;
    assert!(report.drops.is_empty());

    let alerts = read_lines(&ws.alerts);
    assert_eq!(alerts.len(), 1);
    let body = alerts[0]["body"].as_str().unwrap();
    assert!(body.contains("Previous Price: ₹5,300"));
    assert!(body.contains("Savings: ₹500"));
}

#[tokio::test]
async fn test_missing_fixture_degrades_to_fetch_failures() {
    let ws = Workspace::new("lowest_prices.json");
    let mut runner = ws.runner(ws.config("file", "2025-10-12")).await;

    let report = runner.run_cycle().await;
    assert_eq!(report.dates_requested, 3);
    assert_eq!(report.fetch_failures.len(), 3);
    assert!(report.outcomes.is_empty());
    assert!(report.ledger_error.is_none());
    assert!(read_lines(&ws.alerts).is_empty());
    assert_eq!(read_lines(&ws.journal).len(), 1);
}

#[tokio::test]
async fn test_null_price_only_drops_that_quote() {
    let ws = Workspace::new("lowest_prices.json");
    let mut runner = ws.runner(ws.config("file", "2025-10-11")).await;

    ws.write_fixture(
        r#"{"2025-10-10": [{"price": "₹500"}, {"price": null}], "2025-10-11": [{"price": 480}]}"#,
    );
    let report = runner.run_cycle().await;
    assert!(report.fetch_failures.is_empty());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), Some(500));
    assert_eq!(runner.ledger().get(key("2025-10-11")).await.unwrap(), Some(480));
}

#[tokio::test]
async fn test_oversized_price_does_not_block_other_dates() {
    let ws = Workspace::new("lowest_prices.db");
    let mut runner = ws.runner(ws.config("sqlite", "2025-10-11")).await;

    ws.write_fixture(
        r#"{"2025-10-10": [{"price": "₹10000000000000000000"}], "2025-10-11": [{"price": "₹500"}]}"#,
    );
    let report = runner.run_cycle().await;
    assert!(report.ledger_error.is_none());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(runner.ledger().get(key("2025-10-10")).await.unwrap(), None);
    assert_eq!(runner.ledger().get(key("2025-10-11")).await.unwrap(), Some(500));
}

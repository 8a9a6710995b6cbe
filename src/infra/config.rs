//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Secrets and the notification destination may be overridden from the
//! environment after the file is parsed (FAREWATCH_* variables).

use crate::domain::types::{Cabin, DateKey, Passengers, TripType, DEFAULT_TOP_N};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Http,
    Fixture,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackendKind {
    Memory,
    File,
    Sqlite,
}

impl LedgerBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerBackendKind::Memory => "memory",
            LedgerBackendKind::File => "file",
            LedgerBackendKind::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Log,
    File,
    Webhook,
    Mqtt,
}

impl NotifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierKind::Log => "log",
            NotifierKind::File => "file",
            NotifierKind::Webhook => "webhook",
            NotifierKind::Mqtt => "mqtt",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub origin: String,
    pub destination: String,
    pub start_date: DateKey,
    pub end_date: DateKey,
    #[serde(default = "default_adults")]
    pub adults: u8,
    #[serde(default)]
    pub children: u8,
    #[serde(default)]
    pub infants_in_seat: u8,
    #[serde(default)]
    pub infants_on_lap: u8,
    #[serde(default = "default_cabin")]
    pub cabin: Cabin,
    #[serde(default = "default_trip")]
    pub trip: TripType,
    /// Skip dates that are already in the past (UTC)
    #[serde(default)]
    pub skip_past_dates: bool,
}

fn default_adults() -> u8 {
    1
}

fn default_cabin() -> Cabin {
    Cabin::Economy
}

fn default_trip() -> TripType {
    TripType::OneWay
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: default_interval_secs(), run_on_start: default_run_on_start() }
    }
}

fn default_interval_secs() -> u64 {
    7200 // every 2 hours
}

fn default_run_on_start() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub fixture_path: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum concurrent per-date fetches
    #[serde(default = "default_provider_concurrency")]
    pub concurrency: usize,
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_provider_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_unavailable_marker")]
    pub unavailable_marker: String,
    /// Optional conversion multiplier applied after parsing
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            unavailable_marker: default_unavailable_marker(),
            multiplier: None,
            top_n: default_top_n(),
        }
    }
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

fn default_unavailable_marker() -> String {
    "Price unavailable".to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackendKind,
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { backend: default_ledger_backend(), path: default_ledger_path() }
    }
}

fn default_ledger_backend() -> LedgerBackendKind {
    LedgerBackendKind::Memory
}

fn default_ledger_path() -> String {
    "lowest_prices.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_kind")]
    pub kind: NotifierKind,
    #[serde(default)]
    pub recipient: String,
    /// Subject line; defaults to one naming the route
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_notifier_file")]
    pub file: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,
    #[serde(default)]
    pub mqtt_username: Option<String>,
    #[serde(default)]
    pub mqtt_password: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: default_notifier_kind(),
            recipient: String::new(),
            subject: None,
            file: default_notifier_file(),
            webhook_url: String::new(),
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_topic: default_mqtt_topic(),
            mqtt_username: None,
            mqtt_password: None,
        }
    }
}

fn default_notifier_kind() -> NotifierKind {
    NotifierKind::Log
}

fn default_notifier_file() -> String {
    "alerts.jsonl".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "farewatch/drops".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    /// Cycle journal path (JSONL); empty disables it
    #[serde(default = "default_journal_file")]
    pub file: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { file: default_journal_file() }
    }
}

fn default_journal_file() -> String {
    "cycles.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_metrics_interval_secs() -> u64 {
    300
}

fn default_prometheus_port() -> u16 {
    9464
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Consecutive failed fetches for one date before escalating (0 disables)
    #[serde(default = "default_fetch_failure_threshold")]
    pub fetch_failure_threshold: u32,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { fetch_failure_threshold: default_fetch_failure_threshold() }
    }
}

fn default_fetch_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub route: RouteConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    origin: String,
    destination: String,
    start_date: DateKey,
    end_date: DateKey,
    passengers: Passengers,
    cabin: Cabin,
    trip: TripType,
    skip_past_dates: bool,
    interval_secs: u64,
    run_on_start: bool,
    provider_kind: ProviderKind,
    provider_url: String,
    provider_fixture_path: String,
    provider_timeout_ms: u64,
    provider_concurrency: usize,
    currency_symbol: String,
    unavailable_marker: String,
    multiplier: Option<f64>,
    top_n: usize,
    ledger_backend: LedgerBackendKind,
    ledger_path: String,
    notifier_kind: NotifierKind,
    recipient: String,
    subject: Option<String>,
    notifier_file: String,
    webhook_url: String,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_topic: String,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    journal_file: String,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    fetch_failure_threshold: u32,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "BLR".to_string(),
            destination: "UDR".to_string(),
            start_date: DateKey::new(chrono::NaiveDate::from_ymd_opt(2025, 10, 10).unwrap_or_default()),
            end_date: DateKey::new(chrono::NaiveDate::from_ymd_opt(2025, 10, 17).unwrap_or_default()),
            passengers: Passengers::default(),
            cabin: Cabin::Economy,
            trip: TripType::OneWay,
            skip_past_dates: false,
            interval_secs: default_interval_secs(),
            run_on_start: true,
            provider_kind: ProviderKind::Http,
            provider_url: "http://localhost:8000/flights".to_string(),
            provider_fixture_path: String::new(),
            provider_timeout_ms: default_provider_timeout_ms(),
            provider_concurrency: default_provider_concurrency(),
            currency_symbol: default_currency_symbol(),
            unavailable_marker: default_unavailable_marker(),
            multiplier: None,
            top_n: DEFAULT_TOP_N,
            ledger_backend: LedgerBackendKind::Memory,
            ledger_path: default_ledger_path(),
            notifier_kind: NotifierKind::Log,
            recipient: String::new(),
            subject: None,
            notifier_file: default_notifier_file(),
            webhook_url: String::new(),
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_topic: default_mqtt_topic(),
            mqtt_username: None,
            mqtt_password: None,
            journal_file: default_journal_file(),
            metrics_interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
            fetch_failure_threshold: default_fetch_failure_threshold(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Config file path: the explicit one if given, else CONFIG_FILE, else config/dev.toml
    pub fn resolve_config_path(explicit: Option<&str>) -> String {
        Self::resolve_config_path_with(explicit, |key| env::var(key).ok())
    }

    fn resolve_config_path_with<F>(explicit: Option<&str>, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return path.to_string();
        }
        lookup("CONFIG_FILE").unwrap_or_else(|| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self { config_file: path.display().to_string(), ..config }
            .with_env_overrides(|key| env::var(key).ok()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)?;
        let config = Self::from_toml(toml_config);
        config.validate()?;
        Ok(config)
    }

    fn from_toml(toml_config: TomlConfig) -> Self {
        let route = toml_config.route;
        Self {
            origin: route.origin,
            destination: route.destination,
            start_date: route.start_date,
            end_date: route.end_date,
            passengers: Passengers {
                adults: route.adults,
                children: route.children,
                infants_in_seat: route.infants_in_seat,
                infants_on_lap: route.infants_on_lap,
            },
            cabin: route.cabin,
            trip: route.trip,
            skip_past_dates: route.skip_past_dates,
            interval_secs: toml_config.schedule.interval_secs,
            run_on_start: toml_config.schedule.run_on_start,
            provider_kind: toml_config.provider.kind,
            provider_url: toml_config.provider.url,
            provider_fixture_path: toml_config.provider.fixture_path,
            provider_timeout_ms: toml_config.provider.timeout_ms,
            provider_concurrency: toml_config.provider.concurrency,
            currency_symbol: toml_config.pricing.currency_symbol,
            unavailable_marker: toml_config.pricing.unavailable_marker,
            multiplier: toml_config.pricing.multiplier,
            top_n: toml_config.pricing.top_n,
            ledger_backend: toml_config.ledger.backend,
            ledger_path: toml_config.ledger.path,
            notifier_kind: toml_config.notifier.kind,
            recipient: toml_config.notifier.recipient,
            subject: toml_config.notifier.subject,
            notifier_file: toml_config.notifier.file,
            webhook_url: toml_config.notifier.webhook_url,
            mqtt_host: toml_config.notifier.mqtt_host,
            mqtt_port: toml_config.notifier.mqtt_port,
            mqtt_topic: toml_config.notifier.mqtt_topic,
            mqtt_username: toml_config.notifier.mqtt_username,
            mqtt_password: toml_config.notifier.mqtt_password,
            journal_file: toml_config.journal.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            fetch_failure_threshold: toml_config.alerts.fetch_failure_threshold,
            config_file: "inline".to_string(),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.end_date < self.start_date {
            bail!("route.end_date {} is before route.start_date {}", self.end_date, self.start_date);
        }
        if self.top_n == 0 {
            bail!("pricing.top_n must be at least 1");
        }
        if self.provider_concurrency == 0 {
            bail!("provider.concurrency must be at least 1");
        }
        if let Some(m) = self.multiplier {
            if !m.is_finite() || m < 0.0 {
                bail!("pricing.multiplier must be a finite non-negative number, got {}", m);
            }
        }
        if self.interval_secs == 0 {
            bail!("schedule.interval_secs must be greater than 0");
        }
        Ok(())
    }

    /// Apply FAREWATCH_* overrides using the given variable lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FAREWATCH_RECIPIENT") {
            self.recipient = v;
        }
        if let Some(v) = lookup("FAREWATCH_WEBHOOK_URL") {
            self.webhook_url = v;
        }
        if let Some(v) = lookup("FAREWATCH_MQTT_USERNAME") {
            self.mqtt_username = Some(v);
        }
        if let Some(v) = lookup("FAREWATCH_MQTT_PASSWORD") {
            self.mqtt_password = Some(v);
        }
        self
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default().with_env_overrides(|key| env::var(key).ok())
            }
        }
    }

    /// Human-readable route label, e.g. "BLR to UDR"
    pub fn route_label(&self) -> String {
        format!("{} to {}", self.origin, self.destination)
    }

    /// Subject line for drop notifications
    pub fn notification_subject(&self) -> String {
        self.subject
            .clone()
            .unwrap_or_else(|| format!("Flight Price Drop Alert - {}", self.route_label()))
    }

    // Getters for all config fields
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn start_date(&self) -> DateKey {
        self.start_date
    }

    pub fn end_date(&self) -> DateKey {
        self.end_date
    }

    pub fn passengers(&self) -> Passengers {
        self.passengers
    }

    pub fn cabin(&self) -> Cabin {
        self.cabin
    }

    pub fn trip(&self) -> TripType {
        self.trip
    }

    pub fn skip_past_dates(&self) -> bool {
        self.skip_past_dates
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn run_on_start(&self) -> bool {
        self.run_on_start
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider_kind
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    pub fn provider_fixture_path(&self) -> &str {
        &self.provider_fixture_path
    }

    pub fn provider_timeout_ms(&self) -> u64 {
        self.provider_timeout_ms
    }

    pub fn provider_concurrency(&self) -> usize {
        self.provider_concurrency
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    pub fn unavailable_marker(&self) -> &str {
        &self.unavailable_marker
    }

    pub fn multiplier(&self) -> Option<f64> {
        self.multiplier
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn ledger_backend(&self) -> LedgerBackendKind {
        self.ledger_backend
    }

    pub fn ledger_path(&self) -> &str {
        &self.ledger_path
    }

    pub fn notifier_kind(&self) -> NotifierKind {
        self.notifier_kind
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn notifier_file(&self) -> &str {
        &self.notifier_file
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_topic(&self) -> &str {
        &self.mqtt_topic
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn journal_file(&self) -> &str {
        &self.journal_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn fetch_failure_threshold(&self) -> u32 {
        self.fetch_failure_threshold
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the tracked date range
    pub fn with_date_range(mut self, start: DateKey, end: DateKey) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Builder method for tests to set the pricing rules
    pub fn with_pricing(mut self, multiplier: Option<f64>, top_n: usize) -> Self {
        self.multiplier = multiplier;
        self.top_n = top_n;
        self
    }

    /// Builder method for tests to set the fetch failure escalation threshold
    pub fn with_fetch_failure_threshold(mut self, threshold: u32) -> Self {
        self.fetch_failure_threshold = threshold;
        self
    }

    /// Point the ledger at a different backend and path
    pub fn with_ledger(mut self, backend: LedgerBackendKind, path: &str) -> Self {
        self.ledger_backend = backend;
        self.ledger_path = path.to_string();
        self
    }

    /// Builder method for tests to set the per-date fetch timeout
    pub fn with_provider_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.provider_timeout_ms = timeout_ms;
        self
    }

    /// Builder method for tests to set the journal path
    pub fn with_journal_file(mut self, path: &str) -> Self {
        self.journal_file = path.to_string();
        self
    }
}

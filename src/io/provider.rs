//! Fare providers - where raw quotes come from
//!
//! - `HttpFareProvider` - GET a JSON search endpoint, query as URL parameters
//! - `FixtureProvider` - JSON file mapping date to quotes, re-read every fetch

use crate::domain::types::{DateKey, FareQuery, RawQuote};
use crate::infra::config::{Config, ProviderKind};
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Source of raw quotes for one date
#[async_trait]
pub trait FareProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Zero or more quotes for the query; any error means no usable quotes
    async fn fetch(&self, query: &FareQuery) -> anyhow::Result<Vec<RawQuote>>;
}

/// Build the provider selected in config
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn FareProvider>> {
    let provider: Arc<dyn FareProvider> = match config.provider_kind() {
        ProviderKind::Http => Arc::new(HttpFareProvider::new(
            config.provider_url(),
            Duration::from_millis(config.provider_timeout_ms()),
        )?),
        ProviderKind::Fixture => Arc::new(FixtureProvider::new(config.provider_fixture_path())?),
    };
    info!(provider = %provider.name(), "fare_provider_initialized");
    Ok(provider)
}

/// Search responses come wrapped or as a bare list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { flights: Vec<RawQuote> },
    Bare(Vec<RawQuote>),
}

impl SearchResponse {
    fn into_quotes(self) -> Vec<RawQuote> {
        match self {
            SearchResponse::Wrapped { flights } => flights,
            SearchResponse::Bare(flights) => flights,
        }
    }
}

pub struct HttpFareProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpFareProvider {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        if url.is_empty() {
            bail!("provider.url is required for the http provider");
        }
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build provider HTTP client")?;
        Ok(Self { url: url.to_string(), client })
    }

    fn query_params(query: &FareQuery) -> Vec<(&'static str, String)> {
        vec![
            ("date", query.date.to_string()),
            ("from", query.origin.clone()),
            ("to", query.destination.clone()),
            ("adults", query.passengers.adults.to_string()),
            ("children", query.passengers.children.to_string()),
            ("infants_in_seat", query.passengers.infants_in_seat.to_string()),
            ("infants_on_lap", query.passengers.infants_on_lap.to_string()),
            ("seat", query.cabin.as_str().to_string()),
            ("trip", query.trip.as_str().to_string()),
        ]
    }
}

#[async_trait]
impl FareProvider for HttpFareProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, query: &FareQuery) -> anyhow::Result<Vec<RawQuote>> {
        let response = self
            .client
            .get(&self.url)
            .query(&Self::query_params(query))
            .send()
            .await
            .with_context(|| format!("Search request for {} failed", query.date))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Search for {} returned status {}", query.date, status.as_u16());
        }

        let body: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid search response for {}", query.date))?;
        let quotes = body.into_quotes();
        debug!(date = %query.date, quotes = %quotes.len(), "provider_http_fetched");
        Ok(quotes)
    }
}

pub struct FixtureProvider {
    path: PathBuf,
}

impl FixtureProvider {
    pub fn new(path: &str) -> anyhow::Result<Self> {
        if path.is_empty() {
            bail!("provider.fixture_path is required for the fixture provider");
        }
        Ok(Self { path: PathBuf::from(path) })
    }

    async fn load(&self) -> anyhow::Result<HashMap<DateKey, SearchResponse>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read fixture {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", self.path.display()))
    }
}

#[async_trait]
impl FareProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, query: &FareQuery) -> anyhow::Result<Vec<RawQuote>> {
        let mut fixture = self.load().await?;
        let quotes = fixture.remove(&query.date).map(SearchResponse::into_quotes).unwrap_or_default();
        debug!(date = %query.date, quotes = %quotes.len(), "provider_fixture_fetched");
        Ok(quotes)
    }
}

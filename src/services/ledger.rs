//! Price ledger - lowest price ever recorded per date
//!
//! The ledger is the single writer of floors. Storage is pluggable through
//! `LedgerBackend`:
//! - `MemoryBackend` - cleared on every process start
//! - `FileBackend` - JSON document, flushed at the end of each cycle
//! - `SqliteBackend` - upsert per call, nothing to flush

use crate::domain::types::DateKey;
use crate::infra::config::{Config, LedgerBackendKind};
use crate::io::ledger_file::FileBackend;
use crate::io::ledger_sqlite::SqliteBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Storage capability behind the ledger
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Recorded floor for `date`, `None` if never tracked
    async fn get(&self, date: DateKey) -> anyhow::Result<Option<u64>>;

    /// Overwrite the floor for `date`
    async fn set(&self, date: DateKey, price: u64) -> anyhow::Result<()>;

    /// Make pending writes durable; a no-op for per-call backends
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// All floors in ascending date order
    async fn entries(&self) -> anyhow::Result<Vec<(DateKey, u64)>>;
}

/// In-process backend, empty at startup
#[derive(Debug, Default)]
pub struct MemoryBackend {
    floors: Mutex<BTreeMap<DateKey, u64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, date: DateKey) -> anyhow::Result<Option<u64>> {
        Ok(self.floors.lock().get(&date).copied())
    }

    async fn set(&self, date: DateKey, price: u64) -> anyhow::Result<()> {
        self.floors.lock().insert(date, price);
        Ok(())
    }

    async fn entries(&self) -> anyhow::Result<Vec<(DateKey, u64)>> {
        Ok(self.floors.lock().iter().map(|(k, v)| (*k, *v)).collect())
    }
}

/// Owned ledger instance handed to the drop detector
pub struct PriceLedger {
    backend: Box<dyn LedgerBackend>,
}

impl PriceLedger {
    pub fn new(backend: Box<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    /// Ledger with a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Open the backend selected in config
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let backend: Box<dyn LedgerBackend> = match config.ledger_backend() {
            LedgerBackendKind::Memory => Box::new(MemoryBackend::new()),
            LedgerBackendKind::File => Box::new(FileBackend::open(config.ledger_path())?),
            LedgerBackendKind::Sqlite => Box::new(SqliteBackend::open(config.ledger_path()).await?),
        };
        info!(
            backend = %backend.name(),
            path = %config.ledger_path(),
            "ledger_opened"
        );
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get(&self, date: DateKey) -> anyhow::Result<Option<u64>> {
        let floor = self.backend.get(date).await?;
        debug!(date = %date, floor = ?floor, "ledger_get");
        Ok(floor)
    }

    pub async fn set(&self, date: DateKey, price: u64) -> anyhow::Result<()> {
        self.backend.set(date, price).await?;
        debug!(date = %date, price = %price, "ledger_set");
        Ok(())
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        self.backend.flush().await
    }

    pub async fn entries(&self) -> anyhow::Result<Vec<(DateKey, u64)>> {
        self.backend.entries().await
    }
}

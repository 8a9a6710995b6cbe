//! SQLite-backed ledger storage
//!
//! Every `get`/`set` hits the database directly, so floors survive restarts
//! without an explicit flush. Duplicate dates are upserts.

use crate::domain::cycle::epoch_ms;
use crate::domain::types::DateKey;
use crate::services::ledger::LedgerBackend;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS lowest_prices (
        date TEXT PRIMARY KEY,
        price INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO lowest_prices (date, price, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(date) DO UPDATE SET price = excluded.price, updated_at = excluded.updated_at
"#;

pub struct SqliteBackend {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (creating if missing) the database at `path` and ensure the schema
    pub async fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create ledger directory {}", parent.display())
                })?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("Failed to open ledger database {}", path.display()))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create lowest_prices table")?;

        info!(path = %path.display(), "ledger_sqlite_opened");
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the pool, waiting for in-flight statements
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LedgerBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, date: DateKey) -> anyhow::Result<Option<u64>> {
        let row = sqlx::query("SELECT price FROM lowest_prices WHERE date = ?1")
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read floor for {}", date))?;

        match row {
            Some(row) => {
                let price: i64 = row.try_get("price")?;
                let price = u64::try_from(price)
                    .with_context(|| format!("Negative floor {} stored for {}", price, date))?;
                Ok(Some(price))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, date: DateKey, price: u64) -> anyhow::Result<()> {
        let stored = i64::try_from(price)
            .with_context(|| format!("Price {} for {} exceeds storage range", price, date))?;
        sqlx::query(UPSERT)
            .bind(date.to_string())
            .bind(stored)
            .bind(epoch_ms() as i64)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to upsert floor for {}", date))?;
        Ok(())
    }

    async fn entries(&self) -> anyhow::Result<Vec<(DateKey, u64)>> {
        let rows = sqlx::query("SELECT date, price FROM lowest_prices ORDER BY date ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list floors")?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<(DateKey, u64)> {
                let date: String = row.try_get("date")?;
                let price: i64 = row.try_get("price")?;
                let date: DateKey = date
                    .parse()
                    .with_context(|| format!("Invalid date key {:?} in ledger", date))?;
                Ok((date, u64::try_from(price).unwrap_or(0)))
            })
            .collect()
    }
}

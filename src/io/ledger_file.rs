//! File-backed ledger storage
//!
//! Floors live in memory between flushes and are written as one JSON
//! document at the end of each cycle. Writes go to a temporary sibling file
//! which is then renamed over the ledger, so a crash mid-write leaves the
//! previous ledger intact.

use crate::domain::cycle::epoch_ms;
use crate::domain::types::DateKey;
use crate::services::ledger::LedgerBackend;
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk document
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    updated_at: u64,
    #[serde(default)]
    floors: BTreeMap<DateKey, u64>,
}

#[derive(Debug)]
struct FileState {
    floors: BTreeMap<DateKey, u64>,
    dirty: bool,
}

pub struct FileBackend {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileBackend {
    /// Load the ledger at `path`; a missing file starts an empty ledger
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let floors = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ledger file {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                let doc: LedgerDocument = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse ledger file {}", path.display()))?;
                doc.floors
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), entries = %floors.len(), "ledger_file_loaded");
        Ok(Self { path, state: Mutex::new(FileState { floors, dirty: false }) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, doc: &LedgerDocument) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(doc).context("Failed to serialize ledger")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace ledger file {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, date: DateKey) -> anyhow::Result<Option<u64>> {
        Ok(self.state.lock().floors.get(&date).copied())
    }

    async fn set(&self, date: DateKey, price: u64) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.floors.insert(date, price);
        state.dirty = true;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let doc = {
            let state = self.state.lock();
            if !state.dirty {
                return Ok(());
            }
            LedgerDocument { updated_at: epoch_ms(), floors: state.floors.clone() }
        };

        self.write_document(&doc)?;
        self.state.lock().dirty = false;
        debug!(path = %self.path.display(), entries = %doc.floors.len(), "ledger_file_flushed");
        Ok(())
    }

    async fn entries(&self) -> anyhow::Result<Vec<(DateKey, u64)>> {
        Ok(self.state.lock().floors.iter().map(|(k, v)| (*k, *v)).collect())
    }
}

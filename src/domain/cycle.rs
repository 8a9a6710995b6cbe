//! Cycle report - the audit record of one fetch/detect/notify run

use crate::domain::types::{DateKey, DateOutcome, DropRecord};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Summary of one complete cycle, written to the cycle journal
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// UUIDv7 cycle id
    pub cid: String,
    pub started_at: u64,
    pub finished_at: u64,
    /// Dates a fetch was attempted for
    pub dates_requested: usize,
    /// Dates that produced at least one usable quote
    pub dates_quoted: usize,
    pub fetch_failures: Vec<DateKey>,
    pub quotes_accepted: usize,
    pub quotes_rejected: usize,
    pub outcomes: Vec<DateOutcome>,
    pub drops: Vec<DropRecord>,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
}

impl CycleReport {
    pub fn new() -> Self {
        Self {
            cid: new_uuid_v7(),
            started_at: epoch_ms(),
            finished_at: 0,
            dates_requested: 0,
            dates_quoted: 0,
            fetch_failures: Vec::new(),
            quotes_accepted: 0,
            quotes_rejected: 0,
            outcomes: Vec::new(),
            drops: Vec::new(),
            notified: false,
            ledger_error: None,
        }
    }

    /// Mark the cycle as finished
    pub fn finish(&mut self) {
        self.finished_at = epoch_ms();
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at.saturating_sub(self.started_at)
    }

    /// Single-line JSON for the journal
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"cid\":\"{}\"}}", self.cid))
    }
}

impl Default for CycleReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PriceChange;

    #[test]
    fn test_uuid_v7_generation() {
        let uuid1 = new_uuid_v7();
        let uuid2 = new_uuid_v7();

        assert_ne!(uuid1, uuid2);
        assert_eq!(uuid1.len(), 36);
    }

    #[test]
    fn test_report_json() {
        let date: DateKey = "2025-10-10".parse().unwrap();
        let mut report = CycleReport::new();
        report.dates_requested = 1;
        report.dates_quoted = 1;
        report.outcomes.push(DateOutcome {
            date,
            change: PriceChange::Improved,
            previous: Some(500),
            current: 480,
        });
        report.drops.push(DropRecord { date, old: Some(500), new: 480 });
        report.notified = true;
        report.finish();

        let parsed: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(parsed["cid"], report.cid);
        assert_eq!(parsed["outcomes"][0]["change"], "improved");
        assert_eq!(parsed["outcomes"][0]["date"], "2025-10-10");
        assert_eq!(parsed["drops"][0]["old"], 500);
        assert_eq!(parsed["drops"][0]["new"], 480);
        assert_eq!(parsed["notified"], true);
        assert!(parsed.get("ledger_error").is_none());
        assert!(report.finished_at >= report.started_at);
    }
}

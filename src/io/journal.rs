//! Cycle journal - writes completed cycle reports to file
//!
//! Reports are written in JSONL format (one JSON object per line)
//! to the file specified in config. An empty path disables the journal.

use crate::domain::cycle::CycleReport;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Append one line to a JSONL file, creating parent directories on demand
pub fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    debug!(file = %path.display(), bytes = %line.len(), "jsonl_written");
    Ok(())
}

/// Journal writer for cycle reports
pub struct CycleJournal {
    file_path: Option<String>,
}

impl CycleJournal {
    pub fn new(file_path: &str) -> Self {
        if file_path.is_empty() {
            info!("cycle_journal_disabled");
            Self { file_path: None }
        } else {
            info!(file_path = %file_path, "cycle_journal_initialized");
            Self { file_path: Some(file_path.to_string()) }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file_path.is_some()
    }

    /// Write a report to the journal
    /// Returns true if written, false if disabled or failed
    pub fn write_report(&self, report: &CycleReport) -> bool {
        let Some(ref file_path) = self.file_path else {
            return false;
        };

        match append_line(Path::new(file_path), &report.to_json()) {
            Ok(()) => {
                debug!(
                    cid = %report.cid,
                    drops = %report.drops.len(),
                    "cycle_journaled"
                );
                true
            }
            Err(e) => {
                error!(cid = %report.cid, error = %e, "cycle_journal_failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DateKey, DropRecord};
    use std::fs;
    use tempfile::tempdir;

    fn report_with_drop() -> CycleReport {
        let date: DateKey = "2025-10-10".parse().unwrap();
        let mut report = CycleReport::new();
        report.drops.push(DropRecord { date, old: Some(500), new: 480 });
        report.notified = true;
        report.finish();
        report
    }

    #[test]
    fn test_disabled_journal() {
        let journal = CycleJournal::new("");
        assert!(!journal.is_enabled());
        assert!(!journal.write_report(&report_with_drop()));
    }

    #[test]
    fn test_write_report() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("cycles.jsonl");
        let journal = CycleJournal::new(file_path.to_str().unwrap());

        let report = report_with_drop();
        assert!(journal.write_report(&report));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["cid"], report.cid);
        assert_eq!(parsed["drops"][0]["new"], 480);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested_path = dir.path().join("nested").join("dir").join("cycles.jsonl");
        let journal = CycleJournal::new(nested_path.to_str().unwrap());

        assert!(journal.write_report(&report_with_drop()));
        assert!(nested_path.exists());
    }

    #[test]
    fn test_append_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("cycles.jsonl");
        fs::write(&file_path, "{\"existing\":\"data\"}\n").unwrap();

        let journal = CycleJournal::new(file_path.to_str().unwrap());
        let report = report_with_drop();
        journal.write_report(&report);
        journal.write_report(&CycleReport::new());

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("existing"));
        assert!(lines[1].contains(&report.cid));
        for line in lines {
            let _parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }
}

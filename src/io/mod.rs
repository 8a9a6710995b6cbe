//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `provider` - Flight search providers (HTTP endpoint, JSON fixture)
//! - `ledger_file` - JSON document ledger storage
//! - `ledger_sqlite` - SQLite ledger storage
//! - `notifier` - Drop report delivery (log, file, webhook, MQTT)
//! - `journal` - Cycle reports to file (JSONL format)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod journal;
pub mod ledger_file;
pub mod ledger_sqlite;
pub mod notifier;
pub mod prometheus;
pub mod provider;

// Re-export commonly used types
pub use journal::CycleJournal;
pub use notifier::{Notification, Notifier};
pub use provider::FareProvider;

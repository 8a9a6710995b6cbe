//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `normalizer` - Raw provider quotes into comparable fare records
//! - `aggregator` - Per-date grouping and top-N ranking
//! - `ledger` - Lowest recorded price per date, pluggable storage
//! - `detector` - Drop detection against the ledger
//! - `dispatcher` - Report rendering and notifier hand-off
//! - `runner` - One complete fetch/detect/notify cycle
//! - `scheduler` - Fixed-interval cycle loop

pub mod aggregator;
pub mod detector;
pub mod dispatcher;
pub mod ledger;
pub mod normalizer;
pub mod runner;
pub mod scheduler;

// Re-export commonly used types
pub use detector::{Detection, DropDetector};
pub use dispatcher::Dispatcher;
pub use ledger::{LedgerBackend, PriceLedger};
pub use runner::CycleRunner;
pub use scheduler::Scheduler;

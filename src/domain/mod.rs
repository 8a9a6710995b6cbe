//! Domain models - core fare tracking types
//!
//! This module contains the canonical data types used throughout the system:
//! - `DateKey` - canonical tracked date
//! - `RawQuote` / `FareQuote` - provider output before and after normalization
//! - `RankedDateSnapshot` - cheapest quotes per date for one cycle
//! - `DropRecord` - a price drop queued for notification
//! - `CycleReport` - audit record of one cycle

pub mod cycle;
pub mod types;

// Re-export commonly used types at module level
pub use cycle::CycleReport;
pub use types::{
    Cabin, DateKey, DateOutcome, DropRecord, FareQuery, FareQuote, Passengers, PriceChange,
    RankedDateSnapshot, RawQuote, TripType,
};

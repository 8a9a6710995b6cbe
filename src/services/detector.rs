//! Drop detection - compares each date's cheapest quote against its floor
//!
//! Rules per date, processed in ascending date order:
//! - no floor yet: first-seen, floor recorded, nothing notified
//! - strictly below floor: floor lowered, then a drop is queued
//! - equal or above: nothing written, nothing queued
//!
//! A floor is persisted before its drop is queued, so a failed write can
//! never produce a notification that would repeat next cycle.

use crate::domain::types::{DateOutcome, DropRecord, PriceChange, RankedDateSnapshot};
use crate::services::ledger::PriceLedger;
use tracing::{error, info};

/// Result of one detection pass
#[derive(Debug, Default)]
pub struct Detection {
    /// Outcomes for every date processed, in date order
    pub outcomes: Vec<DateOutcome>,
    /// Persisted improvements, in date order
    pub drops: Vec<DropRecord>,
    /// Set when a ledger read or write failed; processing stopped there
    pub ledger_error: Option<anyhow::Error>,
}

impl Detection {
    pub fn first_seen(&self) -> usize {
        self.outcomes.iter().filter(|o| o.change == PriceChange::FirstSeen).count()
    }

    pub fn has_drops(&self) -> bool {
        !self.drops.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DropDetector;

impl DropDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify every snapshot against the ledger and update floors
    pub async fn detect(
        &self,
        snapshots: &[RankedDateSnapshot],
        ledger: &PriceLedger,
    ) -> Detection {
        let mut ordered: Vec<&RankedDateSnapshot> =
            snapshots.iter().filter(|s| !s.quotes.is_empty()).collect();
        ordered.sort_by_key(|s| s.date);

        let mut detection = Detection::default();

        for snapshot in ordered {
            let date = snapshot.date;
            let current = snapshot.min_price();

            let previous = match ledger.get(date).await {
                Ok(previous) => previous,
                Err(e) => {
                    error!(date = %date, error = %e, "ledger_read_failed");
                    detection.ledger_error = Some(e);
                    break;
                }
            };

            let change = match previous {
                None => PriceChange::FirstSeen,
                Some(floor) if current < floor => PriceChange::Improved,
                Some(_) => PriceChange::Unchanged,
            };

            if change != PriceChange::Unchanged {
                if let Err(e) = ledger.set(date, current).await {
                    error!(
                        date = %date,
                        price = %current,
                        change = %change.as_str(),
                        error = %e,
                        "ledger_write_failed"
                    );
                    detection.ledger_error = Some(e);
                    break;
                }
            }

            match change {
                PriceChange::FirstSeen => {
                    info!(date = %date, price = %current, "price_tracking_started");
                }
                PriceChange::Improved => {
                    info!(
                        date = %date,
                        old = ?previous,
                        new = %current,
                        "price_drop_detected"
                    );
                    detection.drops.push(DropRecord { date, old: previous, new: current });
                }
                PriceChange::Unchanged => {}
            }

            detection.outcomes.push(DateOutcome { date, change, previous, current });
        }

        detection
    }
}

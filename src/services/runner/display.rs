//! Per-cycle fare listing

use super::CycleRunner;
use crate::domain::types::{DateKey, DateOutcome, PriceChange, RankedDateSnapshot};
use crate::services::dispatcher::format_price;
use tracing::{info, warn};

impl CycleRunner {
    /// Every recorded floor in date order
    ///
    /// Falls back to this cycle's outcomes when the ledger cannot be listed.
    pub(crate) async fn recorded_floors(&self, outcomes: &[DateOutcome]) -> Vec<(DateKey, u64)> {
        match self.ledger.entries().await {
            Ok(mut entries) => {
                entries.sort_by_key(|(date, _)| *date);
                entries
            }
            Err(e) => {
                warn!(error = %e, "ledger_list_failed");
                outcomes.iter().map(|o| (o.date, o.previous.unwrap_or(o.current))).collect()
            }
        }
    }

    /// Log the ranked quotes of dates that changed, or every recorded floor when none did
    pub(crate) async fn display(&self, snapshots: &[RankedDateSnapshot], outcomes: &[DateOutcome]) {
        let symbol = self.config.currency_symbol();
        let changed: Vec<&DateOutcome> =
            outcomes.iter().filter(|o| o.change != PriceChange::Unchanged).collect();

        if changed.is_empty() {
            for (date, floor) in self.recorded_floors(outcomes).await {
                let seen = outcomes
                    .iter()
                    .find(|o| o.date == date)
                    .map(|o| format!("{}{}", symbol, format_price(o.current)))
                    .unwrap_or_else(|| "-".to_string());
                info!(
                    date = %date,
                    lowest = %format!("{}{}", symbol, format_price(floor)),
                    seen = %seen,
                    "price_unchanged"
                );
            }
            return;
        }

        for outcome in changed {
            let Some(snapshot) = snapshots.iter().find(|s| s.date == outcome.date) else {
                continue;
            };
            for (rank, quote) in snapshot.quotes.iter().enumerate() {
                info!(
                    date = %quote.date,
                    change = %outcome.change.as_str(),
                    rank = %(rank + 1),
                    departure = %quote.departure,
                    arrival = %quote.arrival,
                    stops = %quote.stops,
                    airline = %quote.airline.as_deref().unwrap_or("-"),
                    price = %format!("{}{}", symbol, format_price(quote.price)),
                    "fare_quote"
                );
            }
        }
    }
}

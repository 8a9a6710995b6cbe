//! Per-date aggregation - group, rank and truncate normalized quotes

use crate::domain::types::{DateKey, FareQuote, RankedDateSnapshot};
use rustc_hash::FxHashMap;

/// Groups a cycle's quotes by date and keeps the cheapest `top_n` per date
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    top_n: usize,
}

impl Aggregator {
    /// `top_n` is clamped to at least 1 so a snapshot always has a minimum
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Build one snapshot per date that has at least one quote
    ///
    /// Quotes are ranked ascending by price; equal prices keep provider order
    /// (stable sort). Snapshots are returned in ascending date order.
    pub fn aggregate(&self, quotes: Vec<FareQuote>) -> Vec<RankedDateSnapshot> {
        let mut by_date: FxHashMap<DateKey, Vec<FareQuote>> = FxHashMap::default();
        for quote in quotes {
            by_date.entry(quote.date).or_default().push(quote);
        }

        let mut snapshots: Vec<RankedDateSnapshot> = by_date
            .into_iter()
            .filter(|(_, group)| !group.is_empty())
            .map(|(date, mut group)| {
                group.sort_by_key(|q| q.price);
                group.truncate(self.top_n);
                RankedDateSnapshot { date, quotes: group.into_iter().collect() }
            })
            .collect();

        snapshots.sort_by_key(|s| s.date);
        snapshots
    }
}

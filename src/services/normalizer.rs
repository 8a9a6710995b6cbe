//! Quote normalization - raw provider quotes into comparable fare records
//!
//! Malformed or unavailable quotes are dropped here and counted; they never
//! reach aggregation and never fail the cycle.

use crate::domain::types::{DateKey, FareQuote, RawQuote};
use crate::infra::config::Config;
use tracing::debug;

/// Largest usable price; every ledger backend stores prices as a signed 64-bit integer
pub const MAX_PRICE: u64 = i64::MAX as u64;

/// Parse a provider price string such as "₹12,345" into an integer
///
/// Strips the given currency symbol (or any other leading non-digit run like
/// "$", "Rs." or "€") and thousands separators. Negative, fractional and
/// non-numeric values are unusable.
pub fn parse_price(raw: &str, currency_symbol: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let rest = if !currency_symbol.is_empty() {
        trimmed.strip_prefix(currency_symbol).unwrap_or(trimmed)
    } else {
        trimmed
    };
    let rest = rest.trim_start_matches(|c: char| !c.is_ascii_digit() && c != '-');

    let digits: String = rest.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Turns raw quotes into `FareQuote`s
#[derive(Debug, Clone)]
pub struct QuoteNormalizer {
    currency_symbol: String,
    unavailable_marker: String,
    multiplier: Option<f64>,
}

/// Normalized quotes for one date plus the number dropped
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub quotes: Vec<FareQuote>,
    pub rejected: usize,
}

impl QuoteNormalizer {
    pub fn new(currency_symbol: &str, unavailable_marker: &str, multiplier: Option<f64>) -> Self {
        Self {
            currency_symbol: currency_symbol.to_string(),
            unavailable_marker: unavailable_marker.to_string(),
            multiplier,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.currency_symbol(), config.unavailable_marker(), config.multiplier())
    }

    /// Normalize a single quote, or `None` if its price is unusable
    pub fn normalize(&self, date: DateKey, raw: &RawQuote) -> Option<FareQuote> {
        let price_str = raw.price.trim();
        if price_str.is_empty() || price_str.eq_ignore_ascii_case(&self.unavailable_marker) {
            return None;
        }

        let parsed = parse_price(price_str, &self.currency_symbol)?;
        if parsed > MAX_PRICE {
            return None;
        }
        let price = match self.multiplier {
            Some(m) => {
                let scaled = (parsed as f64 * m).round();
                // 2^63 is the first f64 past MAX_PRICE
                if !scaled.is_finite() || scaled < 0.0 || scaled >= MAX_PRICE as f64 {
                    return None;
                }
                scaled as u64
            }
            None => parsed,
        };

        Some(FareQuote {
            date,
            departure: raw.departure.clone(),
            arrival: raw.arrival.clone(),
            stops: raw.stops,
            raw_price: raw.price.clone(),
            price,
            airline: raw.name.clone(),
        })
    }

    /// Normalize all quotes returned for one date, preserving provider order
    pub fn normalize_all(&self, date: DateKey, raws: &[RawQuote]) -> NormalizedBatch {
        let mut batch = NormalizedBatch { quotes: Vec::with_capacity(raws.len()), rejected: 0 };
        for raw in raws {
            match self.normalize(date, raw) {
                Some(quote) => batch.quotes.push(quote),
                None => {
                    batch.rejected += 1;
                    debug!(date = %date, price = %raw.price, "quote_rejected");
                }
            }
        }
        batch
    }
}

//! Shared types for fare tracking

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Default number of quotes kept per date
pub const DEFAULT_TOP_N: usize = 5;

/// Canonical `YYYY-MM-DD` date key, the unit of tracking
///
/// Backed by a calendar date so every key is valid and canonical. Ordering is
/// chronological, which matches the lexicographic order of the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// All keys from `start` to `end`, both inclusive
    pub fn range_inclusive(start: DateKey, end: DateKey) -> Vec<DateKey> {
        start.0.iter_days().take_while(|d| *d <= end.0).map(DateKey).collect()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(DateKey)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Cabin class requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cabin {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl Cabin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cabin::Economy => "economy",
            Cabin::PremiumEconomy => "premium-economy",
            Cabin::Business => "business",
            Cabin::First => "first",
        }
    }
}

/// Trip type requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "one-way",
            TripType::RoundTrip => "round-trip",
        }
    }
}

/// Passenger mix for a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u8,
    #[serde(default)]
    pub children: u8,
    #[serde(default)]
    pub infants_in_seat: u8,
    #[serde(default)]
    pub infants_on_lap: u8,
}

impl Default for Passengers {
    fn default() -> Self {
        Self { adults: 1, children: 0, infants_in_seat: 0, infants_on_lap: 0 }
    }
}

/// One search request for a single outbound date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareQuery {
    pub date: DateKey,
    pub origin: String,
    pub destination: String,
    pub passengers: Passengers,
    pub cabin: Cabin,
    pub trip: TripType,
}

/// Quote exactly as returned by a provider, before normalization
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawQuote {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub departure: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub arrival: String,
    /// Stop count; providers send either a number or a label such as "Nonstop"
    #[serde(default, deserialize_with = "deserialize_stops")]
    pub stops: u32,
    /// Price as displayed; numbers become their decimal form and null becomes empty
    #[serde(default, deserialize_with = "deserialize_text")]
    pub price: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub is_best: bool,
}

fn deserialize_stops<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StopsVisitor;

    impl<'de> Visitor<'de> for StopsVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a stop count or a stop label")
        }

        fn visit_u64<E>(self, value: u64) -> Result<u32, E>
        where
            E: de::Error,
        {
            Ok(u32::try_from(value).unwrap_or(u32::MAX))
        }

        fn visit_i64<E>(self, value: i64) -> Result<u32, E>
        where
            E: de::Error,
        {
            Ok(u32::try_from(value).unwrap_or(0))
        }

        fn visit_f64<E>(self, value: f64) -> Result<u32, E>
        where
            E: de::Error,
        {
            if value.is_finite() && value >= 0.0 {
                Ok(value.min(u32::MAX as f64) as u32)
            } else {
                Ok(0)
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<u32, E>
        where
            E: de::Error,
        {
            // "Nonstop", "1 stop", "2 stops", "Unknown"
            let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
            Ok(digits.parse().unwrap_or(0))
        }

        fn visit_unit<E>(self) -> Result<u32, E>
        where
            E: de::Error,
        {
            Ok(0)
        }
    }

    deserializer.deserialize_any(StopsVisitor)
}

/// Accept a string, number, bool or null where a text field is expected
///
/// A quote with an odd field type is left for the normalizer to reject
/// instead of failing the whole provider response.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a number or null")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<String, E>
        where
            E: de::Error,
        {
            // 480.0 reads as "480"; 480.5 stays fractional and is rejected later
            if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e18 {
                Ok(format!("{}", value as i64))
            } else {
                Ok(value.to_string())
            }
        }

        fn visit_bool<E>(self, _value: bool) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(String::new())
        }

        fn visit_unit<E>(self) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(String::new())
        }

        fn visit_none<E>(self) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

/// Normalized, comparable fare record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareQuote {
    pub date: DateKey,
    pub departure: String,
    pub arrival: String,
    pub stops: u32,
    /// Price string as the provider sent it
    pub raw_price: String,
    /// Normalized price in a consistent integer scale
    pub price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
}

/// Up to N cheapest quotes for one date, ascending by price
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDateSnapshot {
    pub date: DateKey,
    pub quotes: SmallVec<[FareQuote; DEFAULT_TOP_N]>,
}

impl RankedDateSnapshot {
    /// Cheapest quote of the cycle for this date
    ///
    /// Snapshots are only built from non-empty groups.
    pub fn top(&self) -> &FareQuote {
        &self.quotes[0]
    }

    pub fn min_price(&self) -> u64 {
        self.top().price
    }
}

/// Classification of a date against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceChange {
    /// Never tracked before; recorded, not notified
    FirstSeen,
    /// Strictly below the recorded floor
    Improved,
    /// Equal to or above the recorded floor
    Unchanged,
}

impl PriceChange {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceChange::FirstSeen => "first_seen",
            PriceChange::Improved => "improved",
            PriceChange::Unchanged => "unchanged",
        }
    }
}

/// Per-date result of one detection pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateOutcome {
    pub date: DateKey,
    pub change: PriceChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<u64>,
    pub current: u64,
}

/// A strict decrease of a date's floor, queued for notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropRecord {
    pub date: DateKey,
    /// Absent only for first-seen dates, which are never notified
    pub old: Option<u64>,
    pub new: u64,
}

impl DropRecord {
    pub fn savings(&self) -> u64 {
        self.old.map(|old| old.saturating_sub(self.new)).unwrap_or(0)
    }
}

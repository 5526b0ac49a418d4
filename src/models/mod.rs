use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Candle bucket width
///
/// Only these durations are recognized; anything else is rejected by
/// [`Granularity::from_seconds`]. Serialized as seconds; deserializes from
/// seconds or any form [`FromStr`] accepts (`"1h"`, `"FIVE_MINUTE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u64")]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    SixHours,
    OneDay,
}

impl Granularity {
    pub const ALL: [Granularity; 8] = [
        Granularity::OneMinute,
        Granularity::FiveMinutes,
        Granularity::FifteenMinutes,
        Granularity::ThirtyMinutes,
        Granularity::OneHour,
        Granularity::TwoHours,
        Granularity::SixHours,
        Granularity::OneDay,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinutes => 300,
            Granularity::FifteenMinutes => 900,
            Granularity::ThirtyMinutes => 1800,
            Granularity::OneHour => 3600,
            Granularity::TwoHours => 7200,
            Granularity::SixHours => 21600,
            Granularity::OneDay => 86400,
        }
    }

    pub fn from_seconds(seconds: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.seconds() == seconds)
    }

    /// Exchange-style name, e.g. `FIVE_MINUTE`
    pub fn name(self) -> &'static str {
        match self {
            Granularity::OneMinute => "ONE_MINUTE",
            Granularity::FiveMinutes => "FIVE_MINUTE",
            Granularity::FifteenMinutes => "FIFTEEN_MINUTE",
            Granularity::ThirtyMinutes => "THIRTY_MINUTE",
            Granularity::OneHour => "ONE_HOUR",
            Granularity::TwoHours => "TWO_HOUR",
            Granularity::SixHours => "SIX_HOUR",
            Granularity::OneDay => "ONE_DAY",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Granularity::OneMinute => "1m",
            Granularity::FiveMinutes => "5m",
            Granularity::FifteenMinutes => "15m",
            Granularity::ThirtyMinutes => "30m",
            Granularity::OneHour => "1h",
            Granularity::TwoHours => "2h",
            Granularity::SixHours => "6h",
            Granularity::OneDay => "1d",
        }
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::FiveMinutes
    }
}

impl TryFrom<u64> for Granularity {
    type Error = Error;

    fn try_from(seconds: u64) -> Result<Self, Self::Error> {
        Self::from_seconds(seconds).ok_or(Error::UnsupportedGranularity(seconds))
    }
}

impl From<Granularity> for u64 {
    fn from(granularity: Granularity) -> Self {
        granularity.seconds()
    }
}

impl FromStr for Granularity {
    type Err = Error;

    /// Accepts `FIVE_MINUTE`, `5m` or `300`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(seconds) = trimmed.parse::<u64>() {
            return Self::try_from(seconds);
        }

        Self::ALL
            .into_iter()
            .find(|g| {
                g.name().eq_ignore_ascii_case(trimmed)
                    || g.short_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| Error::InvalidConfig(format!("unknown granularity '{}'", trimmed)))
    }
}

struct GranularityVisitor;

impl<'de> Visitor<'de> for GranularityVisitor {
    type Value = Granularity;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a granularity in seconds or a name like \"5m\"")
    }

    fn visit_u64<E: de::Error>(self, seconds: u64) -> Result<Granularity, E> {
        Granularity::try_from(seconds).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, seconds: i64) -> Result<Granularity, E> {
        let seconds = u64::try_from(seconds).map_err(E::custom)?;
        self.visit_u64(seconds)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Granularity, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Granularity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GranularityVisitor)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// OHLCV candlestick data
///
/// `time` is the bucket start in unix seconds and is aligned to the
/// granularity boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub granularity: Granularity,
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Floor `time` to the start of its `granularity` bucket
    pub fn aligned_time(time: i64, granularity: Granularity) -> i64 {
        let width = granularity.seconds() as i64;
        time.div_euclid(width) * width
    }

    pub fn is_aligned(&self) -> bool {
        self.time.rem_euclid(self.granularity.seconds() as i64) == 0
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Grid level the signal corresponds to
    pub level: Option<u32>,
    pub price: f64,
    pub reason: String,
}

/// Trading signal emitted by a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub metadata: SignalMetadata,
}

impl Signal {
    pub fn buy(level: u32, price: f64, reason: impl Into<String>) -> Self {
        Self {
            signal_type: SignalType::Buy,
            metadata: SignalMetadata {
                level: Some(level),
                price,
                reason: reason.into(),
            },
        }
    }

    pub fn sell(level: u32, price: f64, reason: impl Into<String>) -> Self {
        Self {
            signal_type: SignalType::Sell,
            metadata: SignalMetadata {
                level: Some(level),
                price,
                reason: reason.into(),
            },
        }
    }

    pub fn is_buy(&self) -> bool {
        self.signal_type == SignalType::Buy
    }

    pub fn level(&self) -> Option<u32> {
        self.metadata.level
    }
}

/// One filled grid level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    /// Base-asset units, always > 0 while the position is held
    pub size: f64,
    pub level: u32,
    pub entry_time: i64,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.size
    }
}

/// Account view handed to a strategy by the portfolio owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyBalance {
    /// Free quote-currency balance
    pub usd: f64,
    /// Free base-asset balance
    pub btc: f64,
    /// Reserved quote-currency balance
    pub vault: f64,
    /// Reserved base-asset balance
    pub btc_vault: f64,
}

impl StrategyBalance {
    pub fn with_usd(usd: f64) -> Self {
        Self {
            usd,
            ..Default::default()
        }
    }

    /// Quote value of everything held, base assets marked at `price`
    pub fn equity(&self, price: f64) -> f64 {
        self.usd + self.vault + (self.btc + self.btc_vault) * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_from_seconds() {
        assert_eq!(Granularity::from_seconds(60), Some(Granularity::OneMinute));
        assert_eq!(Granularity::from_seconds(300), Some(Granularity::FiveMinutes));
        assert_eq!(Granularity::from_seconds(86400), Some(Granularity::OneDay));
        assert_eq!(Granularity::from_seconds(120), None);
        assert_eq!(Granularity::from_seconds(0), None);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("FIVE_MINUTE".parse::<Granularity>().unwrap(), Granularity::FiveMinutes);
        assert_eq!("1h".parse::<Granularity>().unwrap(), Granularity::OneHour);
        assert_eq!("900".parse::<Granularity>().unwrap(), Granularity::FifteenMinutes);
        assert!("7m".parse::<Granularity>().is_err());
        assert!(matches!(
            "45".parse::<Granularity>(),
            Err(Error::UnsupportedGranularity(45))
        ));
    }

    #[test]
    fn test_granularity_serializes_as_seconds() {
        let json = serde_json::to_string(&Granularity::SixHours).unwrap();
        assert_eq!(json, "21600");

        let parsed: Granularity = serde_json::from_str("3600").unwrap();
        assert_eq!(parsed, Granularity::OneHour);

        assert!(serde_json::from_str::<Granularity>("61").is_err());
    }

    #[test]
    fn test_granularity_deserializes_from_names() {
        let parsed: Granularity = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(parsed, Granularity::OneHour);

        let parsed: Granularity = serde_json::from_str("\"FIFTEEN_MINUTE\"").unwrap();
        assert_eq!(parsed, Granularity::FifteenMinutes);

        let parsed: Granularity = serde_json::from_str("\"300\"").unwrap();
        assert_eq!(parsed, Granularity::FiveMinutes);

        assert!(serde_json::from_str::<Granularity>("\"7m\"").is_err());
        assert!(serde_json::from_str::<Granularity>("-60").is_err());
    }

    #[test]
    fn test_aligned_time() {
        assert_eq!(Candle::aligned_time(1_700_000_123, Granularity::OneMinute), 1_700_000_100);
        assert_eq!(Candle::aligned_time(1_700_000_250, Granularity::FiveMinutes), 1_700_000_100);
        // Negative timestamps floor towards -inf
        assert_eq!(Candle::aligned_time(-1, Granularity::OneMinute), -60);
    }

    #[test]
    fn test_signal_serialization() {
        let signal = Signal::buy(2, 48_000.0, "drop");
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "buy");
        assert_eq!(json["metadata"]["level"], 2);
    }

    #[test]
    fn test_balance_equity() {
        let balance = StrategyBalance {
            usd: 500.0,
            btc: 0.01,
            vault: 100.0,
            btc_vault: 0.0,
        };
        assert!((balance.equity(50_000.0) - 1100.0).abs() < 1e-9);
    }
}

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;
use crate::models::{Candle, Granularity};

/// 2023-11-14 00:00 UTC, aligned for every granularity
const START_TIME: i64 = 1_699_920_000;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb, +0.05% per candle with noise
    Uptrend,
    /// Steady decline, -0.05% per candle with noise
    Downtrend,
    /// Mean-reverting chop (±1% noise around the base price)
    Sideways,
    /// Large swings (±5% per candle), floored at half the base price
    Volatile,
    /// Flat, sharp 40% crash, then a slow recovery past the start
    CrashRecovery,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::CrashRecovery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::CrashRecovery => "crash-recovery",
        }
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarketScenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == wanted)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown scenario '{}'", s)))
    }
}

/// Generates synthetic price data for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    symbol: String,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: "BTC-USD".to_string(),
            base_price: 30_000.0,
            base_volume: 25.0,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate `num_candles` consecutive, aligned candles for a scenario
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        granularity: Granularity,
    ) -> Vec<Candle> {
        let closes = match scenario {
            MarketScenario::Uptrend => self.trend_closes(num_candles, 0.0005),
            MarketScenario::Downtrend => self.trend_closes(num_candles, -0.0005),
            MarketScenario::Sideways => self.sideways_closes(num_candles),
            MarketScenario::Volatile => self.volatile_closes(num_candles),
            MarketScenario::CrashRecovery => self.crash_recovery_closes(num_candles),
        };

        let start = Candle::aligned_time(START_TIME, granularity);
        let step = granularity.seconds() as i64;

        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| self.create_candle(close, start + i as i64 * step, granularity))
            .collect()
    }

    /// Random walk with a constant drift per candle and ±0.1% noise
    fn trend_closes(&mut self, num_candles: usize, drift: f64) -> Vec<f64> {
        let mut price = self.base_price;
        (0..num_candles)
            .map(|_| {
                let noise = self.rng.gen_range(-0.001..0.001);
                price *= 1.0 + drift + noise;
                price
            })
            .collect()
    }

    fn sideways_closes(&mut self, num_candles: usize) -> Vec<f64> {
        let mean_price = self.base_price;
        let mut price = self.base_price;
        (0..num_candles)
            .map(|_| {
                let reversion = (mean_price - price) * 0.1; // 10% pull to mean
                let noise = price * self.rng.gen_range(-0.01..0.01);
                price += reversion + noise;
                price
            })
            .collect()
    }

    fn volatile_closes(&mut self, num_candles: usize) -> Vec<f64> {
        let floor = self.base_price * 0.5;
        let mut price = self.base_price;
        (0..num_candles)
            .map(|_| {
                price += price * self.rng.gen_range(-0.05..0.05);
                price = price.max(floor);
                price
            })
            .collect()
    }

    /// Piecewise path: flat for 20%, down to 60% of base by 35%, back to 105% at the end
    fn crash_recovery_closes(&mut self, num_candles: usize) -> Vec<f64> {
        let n = num_candles.max(1) as f64;
        let crash_start = 0.20;
        let crash_end = 0.35;

        (0..num_candles)
            .map(|i| {
                let t = i as f64 / n;
                let factor = if t < crash_start {
                    1.0
                } else if t < crash_end {
                    1.0 - 0.4 * (t - crash_start) / (crash_end - crash_start)
                } else {
                    0.6 + 0.45 * (t - crash_end) / (1.0 - crash_end)
                };
                let noise = self.rng.gen_range(-0.003..0.003);
                self.base_price * factor * (1.0 + noise)
            })
            .collect()
    }

    /// Build OHLCV around a close with up to ±0.2% intrabar movement
    fn create_candle(&mut self, close: f64, time: i64, granularity: Granularity) -> Candle {
        let noise_pct = 0.002;

        let high = close * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (close * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);

        // Vary volume ±30%
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            symbol: self.symbol.clone(),
            granularity,
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 500, Granularity::FiveMinutes);

        assert_eq!(candles.len(), 500);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(
            last_price > first_price,
            "Uptrend should end higher: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Downtrend, 500, Granularity::FiveMinutes);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(last_price < first_price);
    }

    #[test]
    fn test_generate_sideways() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Sideways, 500, Granularity::FiveMinutes);

        let base = gen.base_price;
        for candle in &candles {
            assert!(
                candle.close > base * 0.9 && candle.close < base * 1.1,
                "Sideways should stay near base: {} vs {}",
                candle.close,
                base
            );
        }
    }

    #[test]
    fn test_volatile_respects_floor() {
        let mut gen = SyntheticDataGenerator::new(7).with_base_price(100.0);
        let candles = gen.generate(MarketScenario::Volatile, 1_000, Granularity::OneMinute);

        assert!(candles.iter().all(|c| c.close >= 50.0));
    }

    #[test]
    fn test_crash_recovery_shape() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::CrashRecovery, 500, Granularity::FiveMinutes);

        let base = gen.base_price;
        let bottom = candles.iter().map(|c| c.close).reduce(f64::min).unwrap();
        assert!(bottom < base * 0.65);
        assert!(candles.last().unwrap().close > base);
    }

    #[test]
    fn test_candles_are_aligned_and_consecutive() {
        let mut gen = SyntheticDataGenerator::new(42).with_symbol("ETH-USD");
        let candles = gen.generate(MarketScenario::Sideways, 100, Granularity::OneHour);

        assert!(candles.iter().all(|c| c.is_aligned() && c.symbol == "ETH-USD"));
        for pair in candles.windows(2) {
            assert_eq!(pair[1].time - pair[0].time, 3_600);
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(9).generate(
            MarketScenario::Volatile,
            50,
            Granularity::FiveMinutes,
        );
        let b = SyntheticDataGenerator::new(9).generate(
            MarketScenario::Volatile,
            50,
            Granularity::FiveMinutes,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_ohlc_consistency() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Volatile, 100, Granularity::FiveMinutes);

        for candle in &candles {
            assert!(candle.high >= candle.close, "High should be >= close");
            assert!(candle.high >= candle.open, "High should be >= open");
            assert!(candle.low <= candle.close, "Low should be <= close");
            assert!(candle.low <= candle.open, "Low should be <= open");
        }
    }

    #[test]
    fn test_scenario_parse() {
        assert_eq!(
            "crash_recovery".parse::<MarketScenario>().unwrap(),
            MarketScenario::CrashRecovery
        );
        assert_eq!("Uptrend".parse::<MarketScenario>().unwrap(), MarketScenario::Uptrend);
        assert!("moon".parse::<MarketScenario>().is_err());
    }
}

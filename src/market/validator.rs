use crate::error::{Error, Result};
use crate::models::Candle;

/// Validates OHLCV candle data before it reaches a strategy
pub struct CandleValidator {
    require_alignment: bool,
}

impl CandleValidator {
    pub fn new() -> Self {
        Self {
            require_alignment: true,
        }
    }

    /// Skip the `time % granularity == 0` check (raw exchange ticks are rarely aligned)
    pub fn allow_unaligned(mut self) -> Self {
        self.require_alignment = false;
        self
    }

    /// Validate a candle for correctness
    pub fn validate(&self, candle: &Candle) -> Result<()> {
        self.validate_prices(candle)?;
        self.validate_ohlc_relationship(candle)?;
        if self.require_alignment {
            self.validate_alignment(candle)?;
        }
        Ok(())
    }

    /// Validate every candle and that times never go backwards per symbol
    pub fn validate_series(&self, candles: &[Candle]) -> Result<()> {
        for candle in candles {
            self.validate(candle)?;
        }

        for pair in candles.windows(2) {
            if pair[0].symbol == pair[1].symbol && pair[1].time < pair[0].time {
                return Err(Error::InvalidCandle(format!(
                    "{} candles out of order: {} after {}",
                    pair[1].symbol, pair[1].time, pair[0].time
                )));
            }
        }

        Ok(())
    }

    /// Validate that all prices are positive
    fn validate_prices(&self, candle: &Candle) -> Result<()> {
        for (name, value) in [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(Error::InvalidCandle(format!(
                    "Invalid {} price: {}",
                    name, value
                )));
            }
        }
        if !(candle.volume >= 0.0) {
            return Err(Error::InvalidCandle(format!(
                "Invalid volume: {}",
                candle.volume
            )));
        }
        Ok(())
    }

    /// low <= {open, close} <= high
    fn validate_ohlc_relationship(&self, candle: &Candle) -> Result<()> {
        if candle.high < candle.low {
            return Err(Error::InvalidCandle(format!(
                "High ({}) is less than low ({})",
                candle.high, candle.low
            )));
        }

        for (name, value) in [("open", candle.open), ("close", candle.close)] {
            if value > candle.high {
                return Err(Error::InvalidCandle(format!(
                    "High ({}) is less than {} ({})",
                    candle.high, name, value
                )));
            }
            if value < candle.low {
                return Err(Error::InvalidCandle(format!(
                    "Low ({}) is greater than {} ({})",
                    candle.low, name, value
                )));
            }
        }

        Ok(())
    }

    fn validate_alignment(&self, candle: &Candle) -> Result<()> {
        if !candle.is_aligned() {
            return Err(Error::InvalidCandle(format!(
                "Candle time {} is not aligned to {}",
                candle.time, candle.granularity
            )));
        }
        Ok(())
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new()
    }
}

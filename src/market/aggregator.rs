use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{Candle, Granularity};

type PeriodKey = (String, Granularity, i64);

/// Folds raw candle updates into aligned candles of a coarser granularity
///
/// Updates for one key must arrive in non-decreasing time order; nothing is
/// reordered or buffered.
#[derive(Debug, Default)]
pub struct CandleAggregator {
    in_progress: HashMap<PeriodKey, Candle>,
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `raw` into the period it falls in at `target_granularity` seconds
    ///
    /// Returns a copy of the (possibly still open) aggregate, or `None` when
    /// the granularity is not one of the supported durations.
    pub fn process_candle(&mut self, raw: &Candle, target_granularity: u64) -> Option<Candle> {
        let Some(granularity) = Granularity::from_seconds(target_granularity) else {
            tracing::warn!(
                "Ignoring {} candle: unsupported granularity {}s",
                raw.symbol,
                target_granularity
            );
            return None;
        };

        let aligned_time = Candle::aligned_time(raw.time, granularity);
        let key = (raw.symbol.clone(), granularity, aligned_time);

        let candle = self
            .in_progress
            .entry(key)
            .and_modify(|current| {
                current.high = current.high.max(raw.high);
                current.low = current.low.min(raw.low);
                current.close = raw.close;
                current.volume += raw.volume;
            })
            .or_insert_with(|| Candle {
                symbol: raw.symbol.clone(),
                granularity,
                time: aligned_time,
                open: raw.open,
                high: raw.high,
                low: raw.low,
                close: raw.close,
                volume: raw.volume,
            });

        Some(candle.clone())
    }

    /// Remove and return the in-progress candle for a sealed period
    pub fn finalize_period(
        &mut self,
        symbol: &str,
        granularity: Granularity,
        time: i64,
    ) -> Option<Candle> {
        self.in_progress
            .remove(&(symbol.to_string(), granularity, time))
    }

    /// Peek at an in-progress candle without sealing it
    pub fn current(&self, symbol: &str, granularity: Granularity, time: i64) -> Option<&Candle> {
        self.in_progress.get(&(symbol.to_string(), granularity, time))
    }

    pub fn pending_count(&self) -> usize {
        self.in_progress.len()
    }

    /// Drop every in-progress candle
    pub fn cleanup(&mut self) {
        self.in_progress.clear();
    }
}

/// Aggregate a time-ordered series of raw candles into finalized `target` candles
///
/// A bucket is sealed as soon as a raw candle for a later bucket shows up;
/// the last bucket is sealed at the end of the input.
pub fn aggregate_series(raw: &[Candle], target: Granularity) -> Result<Vec<Candle>> {
    let mut aggregator = CandleAggregator::new();
    let mut finalized = Vec::new();
    let mut open: Option<(String, i64)> = None;

    for candle in raw {
        if candle.granularity.seconds() > target.seconds() {
            return Err(Error::InvalidCandle(format!(
                "{} candle at {} is coarser than target {}",
                candle.granularity, candle.time, target
            )));
        }

        let bucket = Candle::aligned_time(candle.time, target);
        if let Some((symbol, time)) = &open {
            if *time != bucket || *symbol != candle.symbol {
                finalized.extend(aggregator.finalize_period(symbol, target, *time));
            }
        }

        aggregator
            .process_candle(candle, target.seconds())
            .ok_or(Error::UnsupportedGranularity(target.seconds()))?;
        open = Some((candle.symbol.clone(), bucket));
    }

    if let Some((symbol, time)) = open {
        finalized.extend(aggregator.finalize_period(&symbol, target, time));
    }

    tracing::debug!(
        "Aggregated {} raw candles into {} {} candles",
        raw.len(),
        finalized.len(),
        target
    );

    Ok(finalized)
}

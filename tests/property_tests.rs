//! Property tests for sizing, ladder accounting and candle aggregation.
//!
//! Uses proptest to verify:
//! 1. Level multipliers follow the linear / geometric rule
//! 2. The closed-form ratio sum matches the brute-force series
//! 3. Scaled percentage ladders spend exactly the cap, each level shrunk
//! 4. Ladder profit is monotonic in price
//! 5. Strategies never emit a sell below the average entry
//! 6. Aggregation partitions raw candles into aligned buckets

use gridbot::config::{PositionSizeMode, StrategyConfig};
use gridbot::market::aggregate_series;
use gridbot::models::{Candle, Granularity, Signal, SignalType, StrategyBalance};
use gridbot::strategy::{Ladder, PositionSizer, ReverseRatioStrategy, Strategy as TradingStrategy};
use proptest::prelude::*;

const MULTIPLIERS: [f64; 4] = [1.0, 1.01, 1.5, 2.0];

fn sizer(max_levels: u32, ratio_multiplier: f64, base_position_percent: f64) -> PositionSizer {
    PositionSizer::new(&StrategyConfig {
        max_levels,
        ratio_multiplier,
        base_position_percent,
        position_size_mode: PositionSizeMode::Percentage,
        max_position_percent: 96.0,
        ..Default::default()
    })
}

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn arb_multiplier() -> impl Strategy<Value = f64> {
    prop::sample::select(MULTIPLIERS.to_vec())
}

fn arb_price() -> impl Strategy<Value = f64> {
    (100.0..100_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

// ── 1. Level multipliers ─────────────────────────────────────────────

proptest! {
    #[test]
    fn linear_multiplier_is_level(level in 1u32..=50) {
        let s = sizer(50, 1.0, 1.0);
        prop_assert_eq!(s.level_multiplier(level), level as f64);
    }

    #[test]
    fn geometric_multiplier_is_power(level in 1u32..=50, r in 1.01..3.0_f64) {
        let s = sizer(50, r, 1.0);
        prop_assert!(close_enough(s.level_multiplier(level), r.powf(level as f64 - 1.0)));
    }
}

// ── 2. Ratio sum ─────────────────────────────────────────────────────

#[test]
fn ratio_sum_matches_brute_force() {
    for r in MULTIPLIERS {
        for max_levels in 1..=50 {
            let s = sizer(max_levels, r, 1.0);
            let brute: f64 = (1..=max_levels).map(|level| s.level_multiplier(level)).sum();
            assert!(
                close_enough(s.ratio_sum(), brute),
                "r={} n={}: closed form {} vs series {}",
                r,
                max_levels,
                s.ratio_sum(),
                brute
            );
        }
    }
}

// ── 3. Scale-down ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn scaled_ladder_spends_exactly_the_cap(
        max_levels in 2u32..=30,
        r in arb_multiplier(),
        balance in 100.0..1_000_000.0_f64,
    ) {
        // A 50% base over-allocates with at least 2 levels
        let s = sizer(max_levels, r, 50.0);
        prop_assume!(s.total_potential_percent() > 96.0);

        let spent: f64 = (1..=max_levels).map(|level| s.dollar_amount(balance, level)).sum();
        prop_assert!(close_enough(spent, balance * 0.96));

        for level in 1..=max_levels {
            prop_assert!(s.adjusted_level_percent(level) < s.level_percent(level));
        }
    }

    #[test]
    fn sell_signals_are_never_sized(level in 1u32..=12, price in arb_price()) {
        let s = sizer(12, 1.0, 8.0);
        let signal = Signal::sell(level, price, "exit");
        prop_assert_eq!(
            s.calculate_position_size(10_000.0, &signal, price, &StrategyBalance::default()),
            0.0
        );
    }
}

// ── 4. Ladder profit ─────────────────────────────────────────────────

#[test]
fn empty_ladder_has_no_average_entry() {
    let ladder = Ladder::new("BTC-USD", 12);
    assert_eq!(ladder.average_entry_price(), 0.0);
    assert_eq!(ladder.profit_percent(123.0), 0.0);
}

proptest! {
    #[test]
    fn profit_is_monotonic_in_price(
        fills in prop::collection::vec((arb_price(), 0.001..5.0_f64), 1..12),
        a in arb_price(),
        b in arb_price(),
    ) {
        let mut ladder = Ladder::new("BTC-USD", 12);
        for (i, (price, size)) in fills.iter().enumerate() {
            prop_assert!(ladder.push(i as u32 + 1, *price, *size, 0).is_some());
        }

        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(ladder.profit_percent(low) <= ladder.profit_percent(high));
    }
}

// ── 5. No loss-taking exits ──────────────────────────────────────────

fn flat_candle(time: i64, price: f64) -> Candle {
    Candle {
        symbol: "BTC-USD".to_string(),
        granularity: Granularity::FiveMinutes,
        time,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 1.0,
    }
}

proptest! {
    #[test]
    fn strategy_never_sells_below_average_entry(
        moves in prop::collection::vec(-0.05..0.05_f64, 1..200),
    ) {
        let mut strategy = ReverseRatioStrategy::new("BTC-USD", StrategyConfig::default()).unwrap();
        let mut candles = Vec::new();
        let mut price = 30_000.0;

        for (i, step) in moves.iter().enumerate() {
            price *= 1.0 + step;
            candles.push(flat_candle(1_700_000_100 + i as i64 * 300, price));

            if let Some(signal) = strategy.analyze(&candles, price) {
                match signal.signal_type {
                    SignalType::Sell => {
                        prop_assert!(price > strategy.calculate_average_entry_price());
                        strategy.record_exit();
                    }
                    SignalType::Buy => {
                        let size = strategy.calculate_position_size(
                            10_000.0,
                            &signal,
                            price,
                            &StrategyBalance::default(),
                        );
                        let level = signal.level().unwrap();
                        let time = candles[i].time;
                        prop_assert!(strategy.record_buy(level, price, size, time).is_some());
                    }
                }
            }
        }
    }
}

// ── 6. Aggregation ───────────────────────────────────────────────────

fn arb_minute_series() -> impl Strategy<Value = Vec<(i64, f64, f64)>> {
    // (minute gap, close, volume)
    prop::collection::vec((0i64..4, 10.0..1_000.0_f64, 0.0..10.0_f64), 1..120)
}

proptest! {
    #[test]
    fn aggregation_partitions_raw_candles(series in arb_minute_series()) {
        let mut time = 1_700_000_100;
        let raw: Vec<Candle> = series
            .iter()
            .map(|&(gap, close, volume)| {
                time += (gap + 1) * 60;
                Candle {
                    symbol: "BTC-USD".to_string(),
                    granularity: Granularity::OneMinute,
                    time,
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume,
                }
            })
            .collect();

        let aggregated = aggregate_series(&raw, Granularity::FiveMinutes).unwrap();

        let mut buckets: Vec<i64> = raw
            .iter()
            .map(|c| Candle::aligned_time(c.time, Granularity::FiveMinutes))
            .collect();
        buckets.dedup();
        prop_assert_eq!(aggregated.len(), buckets.len());

        for candle in &aggregated {
            prop_assert!(candle.is_aligned());
            let members: Vec<&Candle> = raw
                .iter()
                .filter(|c| Candle::aligned_time(c.time, Granularity::FiveMinutes) == candle.time)
                .collect();

            prop_assert_eq!(candle.open, members[0].open);
            prop_assert_eq!(candle.close, members[members.len() - 1].close);
            prop_assert_eq!(
                candle.high,
                members.iter().map(|c| c.high).fold(f64::MIN, f64::max)
            );
            prop_assert_eq!(
                candle.low,
                members.iter().map(|c| c.low).fold(f64::MAX, f64::min)
            );
            let volume: f64 = members.iter().map(|c| c.volume).sum();
            prop_assert!((candle.volume - volume).abs() < 1e-9);
        }
    }
}

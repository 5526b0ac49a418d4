use serde::{Deserialize, Serialize};

use crate::backtest::metrics::{BacktestMetrics, RunTotals, TradeRecord};
use crate::error::{Error, Result};
use crate::execution::PaperExecutor;
use crate::models::{Candle, SignalType};
use crate::strategy::Strategy;

/// Paper account parameters for a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: f64,
    /// Percent of notional charged on every fill
    pub fee_percent: f64,
    /// Percent of each profitable cycle moved to the vault
    pub vault_profit_percent: f64,
    pub include_vault_in_balance: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_balance: 1_000.0,
            fee_percent: 0.1,
            vault_profit_percent: 0.0,
            include_vault_in_balance: false,
        }
    }
}

/// Bookkeeping for the ladder currently open
#[derive(Debug, Default)]
struct OpenCycle {
    /// Capital the ladder is sized against, fixed when level 1 is bought
    capital: f64,
    entry_fees: f64,
}

/// Backtest runner that replays candles through a strategy and a paper account
pub struct BacktestRunner {
    settings: BacktestSettings,
}

impl BacktestRunner {
    pub fn new(settings: BacktestSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    /// Run a backtest over time-ordered candles
    ///
    /// Every candle's close is offered to the strategy with all candles up to
    /// and including it as history. Ladders still open after the last candle
    /// are marked to market, not sold.
    pub fn run<S: Strategy + ?Sized>(
        &self,
        strategy: &mut S,
        candles: &[Candle],
    ) -> Result<BacktestMetrics> {
        if candles.is_empty() {
            return Err(Error::NotEnoughCandles { needed: 1, got: 0 });
        }

        tracing::info!(
            "Starting backtest: {} candles, strategy {}, ${:.2} initial",
            candles.len(),
            strategy.name(),
            self.settings.initial_balance
        );

        let settings = &self.settings;
        let mut executor = PaperExecutor::new(settings.initial_balance, settings.fee_percent)
            .with_vault(
                settings.vault_profit_percent,
                settings.include_vault_in_balance,
            );

        let mut cycle = OpenCycle::default();
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());
        let mut totals = RunTotals {
            initial_equity: self.settings.initial_balance,
            candles: candles.len(),
            ..Default::default()
        };

        for (i, candle) in candles.iter().enumerate() {
            let price = candle.close;

            if let Some(signal) = strategy.analyze(&candles[..=i], price) {
                match signal.signal_type {
                    SignalType::Buy => {
                        if strategy.ladder().is_empty() {
                            cycle = OpenCycle {
                                capital: executor.available_capital(),
                                entry_fees: 0.0,
                            };
                        }

                        let size = strategy.calculate_position_size(
                            cycle.capital,
                            &signal,
                            price,
                            executor.balance(),
                        );
                        match signal.level() {
                            Some(level) if size > 0.0 => {
                                if let Some(fill) = executor.buy(price, size, candle.time) {
                                    if strategy
                                        .record_buy(level, fill.price, fill.size, fill.time)
                                        .is_some()
                                    {
                                        cycle.entry_fees += fill.fee;
                                        totals.total_fees += fill.fee;
                                        totals.buy_fills += 1;
                                        totals.deepest_level = totals.deepest_level.max(level);
                                    } else {
                                        tracing::warn!(
                                            "⚠️  {} rejected L{} fill ({:.8} @ ${:.2})",
                                            strategy.name(),
                                            level,
                                            fill.size,
                                            fill.price
                                        );
                                        executor.cancel_buy(&fill);
                                    }
                                }
                            }
                            Some(level) => {
                                tracing::debug!("No size for L{} @ ${:.2}, skipping", level, price);
                            }
                            None => {}
                        }
                    }
                    SignalType::Sell => {
                        let entry_fees = cycle.entry_fees;
                        let cost_basis = strategy.ladder().cost_basis() + entry_fees;
                        let closed = strategy.record_exit();

                        if !closed.is_empty() {
                            let size: f64 = closed.iter().map(|p| p.size).sum();
                            let fill = executor.sell(price, size, cost_basis, candle.time);
                            totals.total_fees += fill.fee;
                            let record = TradeRecord::from_cycle(&closed, &fill, entry_fees);
                            if let Some(record) = record {
                                tracing::info!(
                                    "✅ Cycle closed: {} levels, net ${:.2} ({:+.2}%)",
                                    record.levels,
                                    record.net_pnl,
                                    record.pnl_pct
                                );
                                trades.push(record);
                            }
                        }
                        cycle = OpenCycle::default();
                    }
                }
            }

            equity_curve.push(executor.equity(price));
        }

        let final_price = candles[candles.len() - 1].close;
        let ladder = strategy.ladder();
        totals.final_equity = executor.equity(final_price);
        totals.vault = executor.balance().vault;
        totals.open_levels = ladder.level();
        if !ladder.is_empty() {
            totals.unrealized_pnl =
                ladder.total_size() * final_price - ladder.cost_basis() - cycle.entry_fees;
        }

        let metrics = BacktestMetrics::calculate(trades, &equity_curve, totals);

        tracing::info!(
            "Backtest complete: {} cycles, {} fills, P&L: ${:.2} ({:.2}%)",
            metrics.completed_cycles,
            metrics.buy_fills,
            metrics.net_pnl,
            metrics.total_return_pct
        );

        Ok(metrics)
    }

    /// Run backtest and print report
    pub fn run_and_report<S: Strategy + ?Sized>(
        &self,
        strategy: &mut S,
        candles: &[Candle],
        scenario_name: &str,
    ) -> Result<BacktestMetrics> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Strategy: {}", strategy.name());
        println!("   Candles: {}", candles.len());
        println!("   Initial Balance: ${:.2}", self.settings.initial_balance);

        let metrics = self.run(strategy, candles)?;
        metrics.print_report();

        Ok(metrics)
    }
}

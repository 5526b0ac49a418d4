use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::Fill;
use crate::models::Position;

/// One completed ladder cycle: every level bought, then sold together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub levels: u32,
    pub avg_entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Quote spent on entries, fees excluded
    pub cost_basis: f64,
    pub pnl: f64,
    pub fees: f64, // entry + exit
    pub net_pnl: f64,
    /// Net P&L relative to cost basis plus entry fees
    pub pnl_pct: f64,
    pub holding_period_minutes: i64,
}

impl TradeRecord {
    pub fn from_cycle(positions: &[Position], exit: &Fill, entry_fees: f64) -> Option<Self> {
        let first = positions.first()?;
        let size: f64 = positions.iter().map(|p| p.size).sum();
        let cost_basis: f64 = positions.iter().map(Position::cost_basis).sum();
        if size <= 0.0 {
            return None;
        }

        let pnl = exit.notional - cost_basis;
        let fees = entry_fees + exit.fee;
        let net_pnl = pnl - fees;
        let invested = cost_basis + entry_fees;
        let pnl_pct = if invested > 0.0 {
            net_pnl / invested * 100.0
        } else {
            0.0
        };

        Some(Self {
            entry_time: to_datetime(first.entry_time),
            exit_time: to_datetime(exit.time),
            levels: positions.len() as u32,
            avg_entry_price: cost_basis / size,
            exit_price: exit.price,
            size,
            cost_basis,
            pnl,
            fees,
            net_pnl,
            pnl_pct,
            holding_period_minutes: (exit.time - first.entry_time) / 60,
        })
    }
}

fn to_datetime(time: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(time, 0).unwrap_or_default()
}

/// Account-level totals collected while replaying candles
#[derive(Debug, Clone, Default)]
pub struct RunTotals {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub unrealized_pnl: f64,
    pub total_fees: f64,
    pub vault: f64,
    pub buy_fills: usize,
    pub deepest_level: u32,
    pub open_levels: u32,
    pub candles: usize,
}

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Equity
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub net_pnl: f64,
    pub total_fees: f64,
    pub vault: f64,

    // Cycles
    pub candles: usize,
    pub completed_cycles: usize,
    pub buy_fills: usize,
    pub winning_cycles: usize,
    pub win_rate: f64,
    pub avg_cycle_pnl: f64,
    pub largest_cycle_pnl: f64,
    pub deepest_level: u32,
    pub open_levels: u32,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    // Holding period
    pub avg_holding_period_minutes: f64,
    pub max_holding_period_minutes: i64,
    pub min_holding_period_minutes: i64,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    /// Build metrics from completed cycles and the per-candle equity curve
    pub fn calculate(trades: Vec<TradeRecord>, equity_curve: &[f64], totals: RunTotals) -> Self {
        let completed_cycles = trades.len();
        let realized_pnl: f64 = trades.iter().map(|t| t.net_pnl).sum();

        let winning_cycles = trades.iter().filter(|t| t.net_pnl > 0.0).count();
        let win_rate = if completed_cycles > 0 {
            winning_cycles as f64 / completed_cycles as f64 * 100.0
        } else {
            0.0
        };
        let avg_cycle_pnl = if completed_cycles > 0 {
            realized_pnl / completed_cycles as f64
        } else {
            0.0
        };
        let largest_cycle_pnl = trades
            .iter()
            .map(|t| t.net_pnl)
            .reduce(f64::max)
            .unwrap_or(0.0);

        let total_return_pct = if totals.initial_equity > 0.0 {
            (totals.final_equity - totals.initial_equity) / totals.initial_equity * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(equity_curve, totals.initial_equity);
        let sharpe_ratio = Self::calculate_sharpe_ratio(&trades);

        let holding: Vec<i64> = trades.iter().map(|t| t.holding_period_minutes).collect();
        let avg_holding_period_minutes = if holding.is_empty() {
            0.0
        } else {
            holding.iter().sum::<i64>() as f64 / holding.len() as f64
        };

        Self {
            initial_equity: totals.initial_equity,
            final_equity: totals.final_equity,
            total_return_pct,
            realized_pnl,
            unrealized_pnl: totals.unrealized_pnl,
            net_pnl: totals.final_equity - totals.initial_equity,
            total_fees: totals.total_fees,
            vault: totals.vault,
            candles: totals.candles,
            completed_cycles,
            buy_fills: totals.buy_fills,
            winning_cycles,
            win_rate,
            avg_cycle_pnl,
            largest_cycle_pnl,
            deepest_level: totals.deepest_level,
            open_levels: totals.open_levels,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            avg_holding_period_minutes,
            max_holding_period_minutes: holding.iter().copied().max().unwrap_or(0),
            min_holding_period_minutes: holding.iter().copied().min().unwrap_or(0),
            trades,
        }
    }

    /// Largest peak-to-trough decline of the equity curve, in dollars and percent of the peak
    fn calculate_drawdown(equity_curve: &[f64], initial_equity: f64) -> (f64, f64) {
        let mut peak = initial_equity;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &equity in equity_curve {
            if equity > peak {
                peak = equity;
            }

            let drawdown = peak - equity;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Mean over standard deviation of cycle returns, risk-free rate 0
    fn calculate_sharpe_ratio(trades: &[TradeRecord]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;

        let variance = returns
            .iter()
            .map(|r| {
                let diff = r - mean_return;
                diff * diff
            })
            .sum::<f64>()
            / returns.len() as f64;

        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            mean_return / std_dev
        } else {
            0.0
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Equity:        ${:.2}", self.initial_equity);
        println!("  Final Equity:          ${:.2}", self.final_equity);
        println!(
            "  Net P&L:               ${:.2} ({:+.2}%)",
            self.net_pnl, self.total_return_pct
        );
        println!("  Realized:              ${:.2}", self.realized_pnl);
        println!("  Unrealized:            ${:.2}", self.unrealized_pnl);
        println!("  Fees Paid:             ${:.2}", self.total_fees);
        if self.vault > 0.0 {
            println!("  Vault:                 ${:.2}", self.vault);
        }

        println!("\n🪜 LADDER STATISTICS");
        println!("  Candles:               {}", self.candles);
        println!("  Buy Fills:             {}", self.buy_fills);
        println!("  Completed Cycles:      {}", self.completed_cycles);
        println!(
            "  Winning Cycles:        {} ({:.1}%)",
            self.winning_cycles, self.win_rate
        );
        println!("  Deepest Level:         {}", self.deepest_level);
        if self.open_levels > 0 {
            println!("  Open Levels at End:    {}", self.open_levels);
        }

        if self.completed_cycles > 0 {
            println!("\n💰 CYCLE ANALYSIS");
            println!("  Average Cycle P&L:     ${:.2}", self.avg_cycle_pnl);
            println!("  Largest Cycle P&L:     ${:.2}", self.largest_cycle_pnl);
            println!("  Sharpe Ratio:          {:.2}", self.sharpe_ratio);

            println!("\n⏱️  HOLDING PERIODS");
            println!(
                "  Average:               {:.1} minutes ({:.1} hours)",
                self.avg_holding_period_minutes,
                self.avg_holding_period_minutes / 60.0
            );
            println!(
                "  Max:                   {} minutes ({:.1} hours)",
                self.max_holding_period_minutes,
                self.max_holding_period_minutes as f64 / 60.0
            );
            println!(
                "  Min:                   {} minutes ({:.1} hours)",
                self.min_holding_period_minutes,
                self.min_holding_period_minutes as f64 / 60.0
            );
        }

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );

        println!("\n═════════════════════════════════════════════════════════\n");
    }
}

//! gridbot CLI: synthetic and replayed backtests of the grid strategies.
//!
//! Commands:
//! - `backtest` runs the configured strategy over synthetic scenarios
//! - `replay` aggregates a JSON candle file and backtests it
//! - `ladder` prints the per-level allocation plan

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gridbot::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use gridbot::config::AppConfig;
use gridbot::market::{aggregate_series, CandleValidator};
use gridbot::models::{Candle, Granularity};
use gridbot::strategy::{build_strategy, PositionSizer};

#[derive(Parser)]
#[command(name = "gridbot", about = "Reverse-ratio grid trading engine")]
struct Cli {
    /// Settings file (TOML, YAML or JSON). GRIDBOT__* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest on synthetic data. Runs every scenario unless one is given.
    Backtest {
        /// uptrend, downtrend, sideways, volatile or crash-recovery
        #[arg(long)]
        scenario: Option<MarketScenario>,

        #[arg(long, default_value_t = 500)]
        candles: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print metrics as JSON instead of the report
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Backtest a JSON array of raw candles after aggregating them.
    Replay {
        #[arg(long)]
        input: PathBuf,

        /// Target granularity (e.g. 5m, 1h, 3600). Defaults to the configured one.
        #[arg(long)]
        granularity: Option<Granularity>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the allocation of every grid level.
    Ladder {
        /// Capital to size against. Defaults to the backtest initial balance.
        #[arg(long)]
        balance: Option<f64>,

        /// Entry price used to convert dollars into size
        #[arg(long, default_value_t = 30_000.0)]
        price: f64,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Commands::Backtest {
            scenario,
            candles,
            seed,
            json,
        } => run_synthetic(&config, scenario, candles, seed, json),
        Commands::Replay {
            input,
            granularity,
            json,
        } => run_replay(&config, &input, granularity, json),
        Commands::Ladder { balance, price } => {
            print_ladder(&config, balance, price);
            Ok(())
        }
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridbot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_synthetic(
    config: &AppConfig,
    scenario: Option<MarketScenario>,
    num_candles: usize,
    seed: u64,
    json: bool,
) -> Result<()> {
    let scenarios = match scenario {
        Some(scenario) => vec![scenario],
        None => MarketScenario::ALL.to_vec(),
    };
    let runner = BacktestRunner::new(config.backtest.clone());
    let mut results = Vec::new();

    for scenario in scenarios {
        let candles = SyntheticDataGenerator::new(seed)
            .with_symbol(config.symbol.as_str())
            .generate(scenario, num_candles, config.granularity);
        let mut strategy =
            build_strategy(config.strategy_kind, &config.symbol, config.strategy.clone())?;

        let metrics = if json {
            runner.run(strategy.as_mut(), &candles)?
        } else {
            runner.run_and_report(strategy.as_mut(), &candles, scenario.name())?
        };
        results.push((scenario.name().to_string(), metrics));
    }

    if json {
        let by_scenario: serde_json::Map<String, serde_json::Value> = results
            .into_iter()
            .map(|(name, metrics)| Ok((name, serde_json::to_value(metrics)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&by_scenario)?);
    } else if results.len() > 1 {
        print_summary_comparison(&results);
    }

    Ok(())
}

fn run_replay(
    config: &AppConfig,
    input: &Path,
    granularity: Option<Granularity>,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let raw: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of candles", input.display()))?;

    CandleValidator::new().validate_series(&raw)?;

    let target = granularity.unwrap_or(config.granularity);
    let candles = aggregate_series(&raw, target)?;
    tracing::info!(
        "📥 Loaded {} raw candles, {} at {}",
        raw.len(),
        candles.len(),
        target
    );

    let mut strategy =
        build_strategy(config.strategy_kind, &config.symbol, config.strategy.clone())?;
    let runner = BacktestRunner::new(config.backtest.clone());

    if json {
        let metrics = runner.run(strategy.as_mut(), &candles)?;
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        runner.run_and_report(strategy.as_mut(), &candles, &input.display().to_string())?;
    }

    Ok(())
}

fn print_ladder(config: &AppConfig, balance: Option<f64>, price: f64) {
    let balance = balance.unwrap_or(config.backtest.initial_balance);
    let sizer = PositionSizer::new(&config.strategy);
    let plan = sizer.ladder(balance, price);

    println!(
        "\n🪜 {:?} ladder: {} levels, ${:.2} capital, entry ${:.2}",
        config.strategy_kind, config.strategy.max_levels, balance, price
    );
    println!(
        "   ratio sum {:.4}, scale factor {:.4}\n",
        sizer.ratio_sum(),
        sizer.scale_factor()
    );

    println!(
        "{:>5} {:>8} {:>10} {:>10} {:>12} {:>14}",
        "Level", "Drop%", "Mult", "Alloc%", "Dollars", "Size"
    );
    println!("{}", "─".repeat(64));

    for allocation in &plan {
        println!(
            "{:>5} {:>8.2} {:>10.4} {:>10.4} {:>12.2} {:>14.8}",
            allocation.level,
            config.strategy.required_drop_percent(allocation.level),
            allocation.multiplier,
            allocation.percent,
            allocation.dollars,
            allocation.size
        );
    }

    let total: f64 = plan.iter().map(|a| a.dollars).sum();
    println!("{}", "─".repeat(64));
    println!("{:>5} {:>54.2}\n", "Total", total);
}

fn print_summary_comparison(results: &[(String, BacktestMetrics)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<16} {:>10} {:>9} {:>7} {:>7} {:>7} {:>8}",
        "Scenario", "P&L", "Return%", "Fills", "Cycles", "Depth", "MaxDD%"
    );
    println!("{}", "─".repeat(70));

    for (name, metrics) in results {
        println!(
            "{:<16} {:>10.2} {:>9.2} {:>7} {:>7} {:>7} {:>8.2}",
            name,
            metrics.net_pnl,
            metrics.total_return_pct,
            metrics.buy_fills,
            metrics.completed_cycles,
            metrics.deepest_level,
            metrics.max_drawdown_pct
        );
    }

    println!();
}

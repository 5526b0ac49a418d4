use serde::{Deserialize, Serialize};

use crate::models::StrategyBalance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillSide {
    Buy,
    Sell,
}

/// Simulated execution of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub side: FillSide,
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub fee: f64,
    /// Part of a buy's cost paid out of the vault
    #[serde(default)]
    pub from_vault: f64,
    pub time: i64,
}

/// Paper-trading account that applies fills to a [`StrategyBalance`]
///
/// Fees are a whole-number percent of notional. A share of every profitable
/// exit can be moved into the quote vault, which only funds new buys when
/// `include_vault_in_balance` is set.
#[derive(Debug, Clone)]
pub struct PaperExecutor {
    balance: StrategyBalance,
    fee_percent: f64,
    vault_profit_percent: f64,
    include_vault_in_balance: bool,
}

impl PaperExecutor {
    pub fn new(initial_usd: f64, fee_percent: f64) -> Self {
        Self {
            balance: StrategyBalance::with_usd(initial_usd),
            fee_percent,
            vault_profit_percent: 0.0,
            include_vault_in_balance: false,
        }
    }

    pub fn with_vault(mut self, vault_profit_percent: f64, include_vault_in_balance: bool) -> Self {
        self.vault_profit_percent = vault_profit_percent;
        self.include_vault_in_balance = include_vault_in_balance;
        self
    }

    pub fn balance(&self) -> &StrategyBalance {
        &self.balance
    }

    /// Capital handed to the sizer as the total available balance
    pub fn available_capital(&self) -> f64 {
        if self.include_vault_in_balance {
            self.balance.usd + self.balance.vault
        } else {
            self.balance.usd
        }
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.balance.equity(price)
    }

    fn fee_for(&self, notional: f64) -> f64 {
        notional * self.fee_percent / 100.0
    }

    /// Buy up to `size` at `price`, clipped to what the account can pay
    ///
    /// Returns `None` when nothing can be bought.
    pub fn buy(&mut self, price: f64, size: f64, time: i64) -> Option<Fill> {
        if !(price > 0.0 && size > 0.0) {
            return None;
        }

        let spendable = self.available_capital();
        let affordable = spendable / (price * (1.0 + self.fee_percent / 100.0));
        let size = size.min(affordable);
        if !(size > 0.0) {
            tracing::debug!(
                "Paper buy skipped: ${:.2} spendable at ${:.2}",
                spendable,
                price
            );
            return None;
        }

        let notional = size * price;
        let fee = self.fee_for(notional);
        let mut cost = notional + fee;

        let from_usd = cost.min(self.balance.usd);
        self.balance.usd -= from_usd;
        cost -= from_usd;
        let from_vault = cost.min(self.balance.vault).max(0.0);
        self.balance.vault -= from_vault;
        self.balance.btc += size;

        Some(Fill {
            side: FillSide::Buy,
            price,
            size,
            notional,
            fee,
            from_vault,
            time,
        })
    }

    /// Undo a buy fill the strategy refused to book
    pub fn cancel_buy(&mut self, fill: &Fill) {
        if fill.side != FillSide::Buy {
            return;
        }
        self.balance.btc = (self.balance.btc - fill.size).max(0.0);
        self.balance.vault += fill.from_vault;
        self.balance.usd += fill.notional + fill.fee - fill.from_vault;
    }

    /// Sell `size` at `price`; `cost_basis` (including entry fees) decides the vault share
    pub fn sell(&mut self, price: f64, size: f64, cost_basis: f64, time: i64) -> Fill {
        let size = size.min(self.balance.btc).max(0.0);
        let notional = size * price;
        let fee = self.fee_for(notional);
        let proceeds = notional - fee;

        self.balance.btc = (self.balance.btc - size).max(0.0);
        self.balance.usd += proceeds;

        let profit = proceeds - cost_basis;
        if profit > 0.0 && self.vault_profit_percent > 0.0 {
            let vaulted = profit * self.vault_profit_percent / 100.0;
            self.balance.usd -= vaulted;
            self.balance.vault += vaulted;
            tracing::info!(
                "🏦 Vaulted ${:.2} of ${:.2} profit (vault ${:.2})",
                vaulted,
                profit,
                self.balance.vault
            );
        }

        Fill {
            side: FillSide::Sell,
            price,
            size,
            notional,
            fee,
            from_vault: 0.0,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_deducts_notional_and_fee() {
        let mut exec = PaperExecutor::new(1000.0, 0.5);
        let fill = exec.buy(100.0, 2.0, 0).unwrap();

        assert_eq!(fill.size, 2.0);
        assert!((fill.fee - 1.0).abs() < 1e-12);
        assert!((exec.balance().usd - 799.0).abs() < 1e-9);
        assert_eq!(exec.balance().btc, 2.0);
    }

    #[test]
    fn test_buy_clipped_to_available_funds() {
        let mut exec = PaperExecutor::new(100.0, 0.0);
        let fill = exec.buy(50.0, 10.0, 0).unwrap();

        assert!((fill.size - 2.0).abs() < 1e-12);
        assert!(exec.balance().usd.abs() < 1e-9);
        assert!(exec.buy(50.0, 1.0, 0).is_none());
    }

    #[test]
    fn test_sell_realizes_proceeds() {
        let mut exec = PaperExecutor::new(1000.0, 0.0);
        exec.buy(100.0, 5.0, 0).unwrap();
        let fill = exec.sell(110.0, 5.0, 500.0, 60);

        assert_eq!(fill.side, FillSide::Sell);
        assert!((exec.balance().usd - 1050.0).abs() < 1e-9);
        assert_eq!(exec.balance().btc, 0.0);
    }

    #[test]
    fn test_profit_share_moves_to_vault() {
        let mut exec = PaperExecutor::new(1000.0, 0.0).with_vault(50.0, false);
        exec.buy(100.0, 5.0, 0).unwrap();
        exec.sell(110.0, 5.0, 500.0, 60);

        // $50 profit, half vaulted
        assert!((exec.balance().vault - 25.0).abs() < 1e-9);
        assert!((exec.balance().usd - 1025.0).abs() < 1e-9);
        assert!((exec.available_capital() - 1025.0).abs() < 1e-9);
        assert!((exec.equity(110.0) - 1050.0).abs() < 1e-9);
    }

    #[test]
    fn test_vault_funds_buys_when_included() {
        let mut exec = PaperExecutor::new(0.0, 0.0).with_vault(0.0, true);
        exec.balance.vault = 100.0;

        assert!((exec.available_capital() - 100.0).abs() < 1e-12);
        let fill = exec.buy(10.0, 5.0, 0).unwrap();
        assert_eq!(fill.size, 5.0);
        assert!((exec.balance().vault - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_vaulting_on_losing_exit() {
        let mut exec = PaperExecutor::new(1000.0, 0.0).with_vault(50.0, false);
        exec.buy(100.0, 5.0, 0).unwrap();
        exec.sell(90.0, 5.0, 500.0, 60);

        assert_eq!(exec.balance().vault, 0.0);
    }

    #[test]
    fn test_cancel_buy_restores_balance() {
        let mut exec = PaperExecutor::new(50.0, 1.0).with_vault(0.0, true);
        exec.balance.vault = 100.0;
        let before = *exec.balance();

        let fill = exec.buy(10.0, 10.0, 0).unwrap();
        assert!(fill.from_vault > 0.0);
        exec.cancel_buy(&fill);

        let after = exec.balance();
        assert!((after.usd - before.usd).abs() < 1e-9);
        assert!((after.vault - before.vault).abs() < 1e-9);
        assert!(after.btc.abs() < 1e-12);
    }
}

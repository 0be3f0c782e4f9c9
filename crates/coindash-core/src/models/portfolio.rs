use serde::{Deserialize, Serialize};

use super::Coin;

/// A holding in the user's portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(alias = "coin_id", alias = "coin")]
    pub coin_id: String,
    pub amount: f64,
    /// Purchase price per unit
    #[serde(alias = "purchase_price", alias = "purchasePrice")]
    pub price: f64,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

impl PortfolioEntry {
    pub fn cost_basis(&self) -> f64 {
        self.amount * self.price
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.amount * current_price
    }

    pub fn profit_loss(&self, current_price: f64) -> f64 {
        self.market_value(current_price) - self.cost_basis()
    }

    /// Current price looked up in `coins`, if present
    pub fn current_price(&self, coins: &[Coin]) -> Option<f64> {
        coins
            .iter()
            .find(|c| c.id == self.coin_id)
            .and_then(|c| c.current_price)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolioEntry<'a> {
    pub coin_id: &'a str,
    pub amount: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioUpdate {
    pub amount: f64,
    pub price: f64,
}

/// Portfolio totals against current prices; entries without a known
/// price contribute their cost basis to both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortfolioSummary {
    pub cost_basis: f64,
    pub market_value: f64,
}

impl PortfolioSummary {
    pub fn from_entries(entries: &[PortfolioEntry], coins: &[Coin]) -> Self {
        entries.iter().fold(Self::default(), |acc, entry| {
            let cost = entry.cost_basis();
            let value = entry
                .current_price(coins)
                .map(|p| entry.market_value(p))
                .unwrap_or(cost);
            Self {
                cost_basis: acc.cost_basis + cost,
                market_value: acc.market_value + value,
            }
        })
    }

    pub fn profit_loss(&self) -> f64 {
        self.market_value - self.cost_basis
    }

    pub fn profit_loss_percentage(&self) -> Option<f64> {
        if self.cost_basis == 0.0 {
            None
        } else {
            Some(self.profit_loss() / self.cost_basis * 100.0)
        }
    }
}

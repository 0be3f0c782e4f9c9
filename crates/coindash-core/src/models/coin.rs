use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A market quote for one coin.
///
/// The backend has shipped both camelCase and snake_case field names
/// depending on version, so every multi-word field accepts both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "current_price")]
    pub current_price: Option<f64>,
    #[serde(default, alias = "market_cap")]
    pub market_cap: Option<f64>,
    #[serde(default, alias = "market_cap_rank")]
    pub market_cap_rank: Option<u32>,
    #[serde(default, alias = "total_volume")]
    pub total_volume: Option<f64>,
    #[serde(default, alias = "high_24h")]
    pub high_24h: Option<f64>,
    #[serde(default, alias = "low_24h")]
    pub low_24h: Option<f64>,
    #[serde(default, alias = "price_change_24h")]
    pub price_change_24h: Option<f64>,
    #[serde(default, alias = "price_change_percentage_24h")]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default, alias = "circulating_supply")]
    pub circulating_supply: Option<f64>,
    #[serde(default, alias = "total_supply")]
    pub total_supply: Option<f64>,
    #[serde(default, alias = "max_supply")]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
    #[serde(default)]
    pub atl: Option<f64>,
    #[serde(default, alias = "last_updated")]
    pub last_updated: Option<String>,
}

impl Coin {
    pub fn is_up_24h(&self) -> bool {
        self.price_change_percentage_24h.unwrap_or(0.0) >= 0.0
    }
}

/// Chart ranges accepted by the price-history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1d")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
    #[serde(rename = "max")]
    Max,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::Quarter,
        TimeRange::Year,
        TimeRange::Max,
    ];

    /// Value for the `range` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            TimeRange::Day => "1d",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
            TimeRange::Year => "1y",
            TimeRange::Max => "max",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Day => "1 Day",
            TimeRange::Week => "7 Days",
            TimeRange::Month => "30 Days",
            TimeRange::Quarter => "90 Days",
            TimeRange::Year => "1 Year",
            TimeRange::Max => "Max",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            TimeRange::Day => TimeRange::Week,
            TimeRange::Week => TimeRange::Month,
            TimeRange::Month => TimeRange::Quarter,
            TimeRange::Quarter => TimeRange::Year,
            TimeRange::Year => TimeRange::Max,
            TimeRange::Max => TimeRange::Day,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            TimeRange::Day => TimeRange::Max,
            TimeRange::Week => TimeRange::Day,
            TimeRange::Month => TimeRange::Week,
            TimeRange::Quarter => TimeRange::Month,
            TimeRange::Year => TimeRange::Quarter,
            TimeRange::Max => TimeRange::Year,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_param() == s)
            .ok_or_else(|| format!("unknown time range: {}", s))
    }
}

/// One chart sample; `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub coin_id: String,
    pub range: TimeRange,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    /// (min, max) price across the series
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let mut iter = self.points.iter().map(|p| p.price);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Percentage change from first to last sample
    pub fn change_percentage(&self) -> Option<f64> {
        let first = self.points.first()?.price;
        let last = self.points.last()?.price;
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }
}

/// Aggregate market figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    #[serde(default, alias = "total_market_cap")]
    pub total_market_cap: Option<f64>,
    #[serde(default, alias = "total_volume")]
    pub total_volume: Option<f64>,
    #[serde(default, alias = "market_cap_change_percentage_24h")]
    pub market_cap_change_percentage_24h: Option<f64>,
    #[serde(default, alias = "btc_dominance")]
    pub btc_dominance: Option<f64>,
    #[serde(default, alias = "active_cryptocurrencies")]
    pub active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    pub coins: Vec<Coin>,
    #[serde(default, alias = "last_updated")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GainersLosers {
    #[serde(default)]
    pub gainers: Vec<Coin>,
    #[serde(default)]
    pub losers: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "market_cap_rank")]
    pub market_cap_rank: Option<u32>,
}

/// Coin detail is loosely typed upstream; the common fields are lifted
/// and everything else is kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CoinDetail {
    /// Scalar extra fields as (key, display value), sorted by key
    pub fn extra_fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = self
            .extra
            .iter()
            .filter_map(|(k, v)| {
                let shown = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k.clone(), shown))
            })
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    }
}

/// Watchlist payloads are either bare coin ids or full coin objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchlistItem {
    Id(String),
    Coin(Box<Coin>),
}

impl WatchlistItem {
    pub fn coin_id(&self) -> &str {
        match self {
            WatchlistItem::Id(id) => id,
            WatchlistItem::Coin(coin) => &coin.id,
        }
    }
}

/// Resolve watchlist items to coins, looking bare ids up in `catalog`.
/// Ids missing from the catalog are dropped.
pub fn resolve_watchlist(items: &[WatchlistItem], catalog: &[Coin]) -> Vec<Coin> {
    items
        .iter()
        .filter_map(|item| match item {
            WatchlistItem::Coin(coin) => Some(coin.as_ref().clone()),
            WatchlistItem::Id(id) => catalog.iter().find(|c| &c.id == id).cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: &str) -> Coin {
        serde_json::from_value(serde_json::json!({"id": id, "symbol": id, "name": id})).unwrap()
    }

    #[test]
    fn test_coin_accepts_both_casings() {
        let camel: Coin = serde_json::from_str(
            r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","currentPrice":65000.5,"marketCapRank":1}"#,
        )
        .unwrap();
        let snake: Coin = serde_json::from_str(
            r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":65000.5,"market_cap_rank":1}"#,
        )
        .unwrap();
        assert_eq!(camel.current_price, Some(65000.5));
        assert_eq!(camel, snake);
    }

    #[test]
    fn test_time_range_params() {
        assert_eq!(TimeRange::default(), TimeRange::Week);
        assert_eq!("90d".parse::<TimeRange>().unwrap(), TimeRange::Quarter);
        assert!("2w".parse::<TimeRange>().is_err());
        for range in TimeRange::ALL {
            assert_eq!(range.next().prev(), range);
        }
    }

    #[test]
    fn test_price_history_bounds_and_change() {
        let history = PriceHistory {
            coin_id: "bitcoin".to_string(),
            range: TimeRange::Day,
            points: vec![
                PricePoint { timestamp: 1, price: 100.0 },
                PricePoint { timestamp: 2, price: 80.0 },
                PricePoint { timestamp: 3, price: 110.0 },
            ],
        };
        assert_eq!(history.bounds(), Some((80.0, 110.0)));
        let change = history.change_percentage().unwrap();
        assert!((change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_watchlist_items_mixed() {
        let items: Vec<WatchlistItem> = serde_json::from_str(
            r#"["bitcoin", {"id":"ethereum","symbol":"eth","name":"Ethereum"}, "missing"]"#,
        )
        .unwrap();
        assert_eq!(items[0].coin_id(), "bitcoin");
        assert_eq!(items[1].coin_id(), "ethereum");

        let resolved = resolve_watchlist(&items, &[coin("bitcoin"), coin("solana")]);
        let ids: Vec<&str> = resolved.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn test_coin_detail_keeps_extra_fields() {
        let detail: CoinDetail = serde_json::from_str(
            r#"{"id":"bitcoin","name":"Bitcoin","genesis_date":"2009-01-03","hashing_algorithm":"SHA-256","links":{}}"#,
        )
        .unwrap();
        assert_eq!(
            detail.extra_fields(),
            vec![
                ("genesis_date".to_string(), "2009-01-03".to_string()),
                ("hashing_algorithm".to_string(), "SHA-256".to_string()),
            ]
        );
    }
}

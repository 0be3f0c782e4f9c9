//! Coin market data, watchlist and portfolio queries.

use serde_json::{json, Value};
use tracing::{debug, warn};
use urlencoding::encode;

use crate::api::{normalize_list, normalize_price_history, ApiClient, ApiError, ApiResult};
use crate::models::{
    Coin, CoinDetail, GainersLosers, MarketData, NewPortfolioEntry, NewsArticle, PortfolioEntry,
    PortfolioUpdate, PriceHistory, SearchResult, TimeRange, WatchlistItem,
};

use super::{QueryCache, QueryKey};

/// Default number of coins on the dashboard
pub const DEFAULT_TOP_COINS: usize = 50;

/// Default number of news articles
pub const DEFAULT_NEWS_LIMIT: usize = 10;

#[derive(Clone)]
pub struct CoinQueries {
    api: ApiClient,
    cache: QueryCache,
}

impl CoinQueries {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn get_list<T: serde::de::DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let body: Value = self.api.get(path).await?;
        let envelope = normalize_list(body).map_err(ApiError::decode)?;
        debug!(path = path, count = envelope.len(), "Fetched list");
        Ok(envelope.into_vec())
    }

    // ===== Market =====

    /// Top coins by market cap. Failures yield an empty list so the
    /// dashboard can still render.
    pub async fn top_coins(&self, limit: usize) -> Vec<Coin> {
        let path = format!("/coins/top?limit={}", limit);
        let result = self
            .cache
            .fetch(QueryKey::TopCoins(limit), || self.get_list(&path))
            .await;

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch top coins");
            Vec::new()
        })
    }

    pub async fn coin(&self, id: &str) -> ApiResult<Coin> {
        let path = format!("/coins/{}", encode(id));
        self.cache
            .fetch(QueryKey::Coin(id.to_string()), || self.api.get(&path))
            .await
    }

    pub async fn coin_detail(&self, id: &str) -> ApiResult<CoinDetail> {
        let path = format!("/coins/{}/detail", encode(id));
        self.cache
            .fetch(QueryKey::CoinDetail(id.to_string()), || self.api.get(&path))
            .await
    }

    pub async fn price_history(&self, id: &str, range: TimeRange) -> ApiResult<PriceHistory> {
        let path = format!("/coins/{}/price-history?range={}", encode(id), range.as_param());
        let api = &self.api;
        self.cache
            .fetch(QueryKey::PriceHistory(id.to_string(), range), || async move {
                let body: Value = api.get(&path).await?;
                Ok(PriceHistory {
                    coin_id: id.to_string(),
                    range,
                    points: normalize_price_history(&body),
                })
            })
            .await
    }

    pub async fn market_data(&self) -> ApiResult<MarketData> {
        self.cache
            .fetch(QueryKey::MarketData, || self.api.get("/coins/market-data"))
            .await
    }

    pub async fn gainers_losers(&self) -> ApiResult<GainersLosers> {
        self.cache
            .fetch(QueryKey::GainersLosers, || self.api.get("/coins/gainers-losers"))
            .await
    }

    pub async fn trending(&self) -> ApiResult<Vec<Coin>> {
        self.cache
            .fetch(QueryKey::Trending, || self.get_list("/coins/trending"))
            .await
    }

    /// Search coins by name or symbol. A blank query returns nothing
    /// without calling the backend.
    pub async fn search(&self, query: &str) -> ApiResult<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("/coins/search?q={}", encode(query));
        self.cache
            .fetch(QueryKey::Search(query.to_string()), || self.get_list(&path))
            .await
    }

    /// Force the next market reads to hit the backend.
    pub fn invalidate_market(&self) {
        self.cache.invalidate_where(|key| {
            matches!(
                key,
                QueryKey::TopCoins(_)
                    | QueryKey::MarketData
                    | QueryKey::GainersLosers
                    | QueryKey::Trending
            )
        });
    }

    // ===== News =====

    pub async fn news(&self, limit: usize) -> ApiResult<Vec<NewsArticle>> {
        let path = format!("/news?limit={}", limit);
        self.cache
            .fetch(QueryKey::News(limit), || self.get_list(&path))
            .await
    }

    pub async fn coin_news(&self, id: &str, limit: usize) -> ApiResult<Vec<NewsArticle>> {
        let path = format!("/news/coin/{}?limit={}", encode(id), limit);
        self.cache
            .fetch(QueryKey::CoinNews(id.to_string(), limit), || self.get_list(&path))
            .await
    }

    // ===== Watchlist =====

    pub async fn watchlist(&self) -> ApiResult<Vec<WatchlistItem>> {
        self.cache
            .fetch(QueryKey::Watchlist, || self.get_list("/coins/watchlist"))
            .await
    }

    pub async fn add_to_watchlist(&self, id: &str) -> ApiResult<()> {
        let path = format!("/coins/watchlist/{}", encode(id));
        let result = self.api.post::<Value, _>(&path, &json!({})).await;
        self.cache.invalidate(&QueryKey::Watchlist);
        result.map(|_| ())
    }

    pub async fn remove_from_watchlist(&self, id: &str) -> ApiResult<()> {
        let path = format!("/coins/watchlist/{}", encode(id));
        let result = self.api.delete::<Value>(&path).await;
        self.cache.invalidate(&QueryKey::Watchlist);
        result.map(|_| ())
    }

    // ===== Portfolio =====

    pub async fn portfolio(&self) -> ApiResult<Vec<PortfolioEntry>> {
        self.cache
            .fetch(QueryKey::Portfolio, || self.get_list("/coins/portfolio"))
            .await
    }

    pub async fn add_to_portfolio(&self, coin_id: &str, amount: f64, price: f64) -> ApiResult<()> {
        let body = NewPortfolioEntry {
            coin_id,
            amount,
            price,
        };
        let result = self.api.post::<Value, _>("/coins/portfolio", &body).await;
        self.cache.invalidate(&QueryKey::Portfolio);
        result.map(|_| ())
    }

    pub async fn update_portfolio_entry(&self, id: &str, amount: f64, price: f64) -> ApiResult<()> {
        let path = format!("/coins/portfolio/{}", encode(id));
        let body = PortfolioUpdate { amount, price };
        let result = self.api.put::<Value, _>(&path, &body).await;
        self.cache.invalidate(&QueryKey::Portfolio);
        result.map(|_| ())
    }

    pub async fn remove_from_portfolio(&self, id: &str) -> ApiResult<()> {
        let path = format!("/coins/portfolio/{}", encode(id));
        let result = self.api.delete::<Value>(&path).await;
        self.cache.invalidate(&QueryKey::Portfolio);
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn queries_for(uri: &str) -> CoinQueries {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let api = ApiClient::new(uri, Duration::from_secs(5), store).unwrap();
        CoinQueries::new(api, QueryCache::new())
    }

    fn coins_json() -> Value {
        json!([
            {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 60000.0},
            {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "currentPrice": 3000.0}
        ])
    }

    async fn top_coins_with(body: ResponseTemplate) -> Vec<Coin> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/top"))
            .and(query_param("limit", "50"))
            .respond_with(body)
            .mount(&server)
            .await;
        queries_for(&server.uri()).top_coins(50).await
    }

    // ========================================================================
    // Top coins envelopes
    // ========================================================================

    #[tokio::test]
    async fn test_top_coins_results_envelope() {
        let coins = top_coins_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": coins_json(), "count": 2})),
        )
        .await;
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[1].current_price, Some(3000.0));
    }

    #[tokio::test]
    async fn test_top_coins_data_envelope() {
        let coins =
            top_coins_with(ResponseTemplate::new(200).set_body_json(json!({"data": coins_json()})))
                .await;
        assert_eq!(coins.len(), 2);
    }

    #[tokio::test]
    async fn test_top_coins_bare_list() {
        let coins = top_coins_with(ResponseTemplate::new(200).set_body_json(coins_json())).await;
        let ids: Vec<&str> = coins.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum"]);
    }

    #[tokio::test]
    async fn test_top_coins_error_yields_empty() {
        let coins = top_coins_with(ResponseTemplate::new(503)).await;
        assert!(coins.is_empty());
    }

    #[tokio::test]
    async fn test_top_coins_cached_within_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/top"))
            .respond_with(ResponseTemplate::new(200).set_body_json(coins_json()))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        assert_eq!(queries.top_coins(50).await.len(), 2);
        assert_eq!(queries.top_coins(50).await.len(), 2);
    }

    // ========================================================================
    // Coin data
    // ========================================================================

    #[tokio::test]
    async fn test_price_history_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/price-history"))
            .and(query_param("range", "30d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[1714521600000_i64, 60000.0], {"timestamp": "2024-05-02", "price": 61000.0}]
            })))
            .mount(&server)
            .await;

        let history = queries_for(&server.uri())
            .price_history("bitcoin", TimeRange::Month)
            .await
            .unwrap();
        assert_eq!(history.range, TimeRange::Month);
        assert_eq!(history.points.len(), 2);
        assert_eq!(history.points[1].timestamp, 1714608000000);
    }

    #[tokio::test]
    async fn test_coin_detail_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/nope/detail"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
            .mount(&server)
            .await;

        let err = queries_for(&server.uri()).coin_detail("nope").await.unwrap_err();
        assert_eq!(err.message, "Not found.");
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn test_blank_search_skips_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let results = queries_for(&server.uri()).search("   ").await.unwrap();
        assert!(results.is_empty());
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    #[tokio::test]
    async fn test_watchlist_mutation_invalidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/watchlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["bitcoin"])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/coins/watchlist/ethereum"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        let items = queries.watchlist().await.unwrap();
        assert_eq!(items[0].coin_id(), "bitcoin");
        assert!(queries.cache().contains(&QueryKey::Watchlist));

        queries.add_to_watchlist("ethereum").await.unwrap();
        assert!(!queries.cache().contains(&QueryKey::Watchlist));
        queries.watchlist().await.unwrap();
    }

    #[tokio::test]
    async fn test_portfolio_mutations_invalidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/portfolio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "coinId": "bitcoin", "amount": 0.5, "price": 50000.0}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/coins/portfolio"))
            .and(body_json(json!({"coinId": "ethereum", "amount": 2.0, "price": 3000.0})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/coins/portfolio/1"))
            .and(body_json(json!({"amount": 1.0, "price": 50000.0})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/coins/portfolio/1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Locked"})))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server.uri());
        let entries = queries.portfolio().await.unwrap();
        assert_eq!(entries[0].id, "1");

        queries.add_to_portfolio("ethereum", 2.0, 3000.0).await.unwrap();
        assert!(!queries.cache().contains(&QueryKey::Portfolio));

        queries.portfolio().await.unwrap();
        queries.update_portfolio_entry("1", 1.0, 50000.0).await.unwrap();
        assert!(!queries.cache().contains(&QueryKey::Portfolio));

        // Failed mutations still invalidate
        queries.portfolio().await.unwrap();
        let err = queries.remove_from_portfolio("1").await.unwrap_err();
        assert_eq!(err.message, "Locked");
        assert!(!queries.cache().contains(&QueryKey::Portfolio));
    }
}

//! In-memory query cache with per-query staleness windows.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ApiResult;
use crate::models::TimeRange;

const SECS_30: Duration = Duration::from_secs(30);
const MINUTE: Duration = Duration::from_secs(60);
const MINUTES_5: Duration = Duration::from_secs(5 * 60);
const MINUTES_10: Duration = Duration::from_secs(10 * 60);

/// How often live market views should poll top coins and market data
pub const POLL_INTERVAL: Duration = MINUTE;

/// Identity of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    TopCoins(usize),
    Coin(String),
    CoinDetail(String),
    PriceHistory(String, TimeRange),
    MarketData,
    Trending,
    GainersLosers,
    Search(String),
    Watchlist,
    Portfolio,
    News(usize),
    CoinNews(String, usize),
    ChatSessions,
    ChatSession(String),
    ChatSuggestions,
    PopularQueries,
}

impl QueryKey {
    /// How long a cached result counts as fresh
    pub fn stale_after(&self) -> Duration {
        match self {
            QueryKey::TopCoins(_)
            | QueryKey::Coin(_)
            | QueryKey::CoinDetail(_)
            | QueryKey::MarketData
            | QueryKey::Search(_)
            | QueryKey::Watchlist
            | QueryKey::Portfolio => SECS_30,
            QueryKey::PriceHistory(..) => MINUTE,
            QueryKey::Trending
            | QueryKey::GainersLosers
            | QueryKey::News(_)
            | QueryKey::CoinNews(..)
            | QueryKey::ChatSessions
            | QueryKey::ChatSession(_) => MINUTES_5,
            QueryKey::ChatSuggestions | QueryKey::PopularQueries => MINUTES_10,
        }
    }

    /// Keys derived from one coin's data
    pub fn concerns_coin(&self, coin_id: &str) -> bool {
        match self {
            QueryKey::Coin(id)
            | QueryKey::CoinDetail(id)
            | QueryKey::PriceHistory(id, _)
            | QueryKey::CoinNews(id, _) => id == coin_id,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub value: Value,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
        }
    }

    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.cached_at).num_seconds()
    }

    pub fn age_display(&self) -> String {
        let seconds = self.age_seconds();
        if seconds < 10 {
            // Includes negative ages from clock skew
            "just now".to_string()
        } else if seconds < 60 {
            format!("{}s ago", seconds)
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else {
            format!("{}h ago", seconds / 3600)
        }
    }

    pub fn is_stale(&self, window: Duration) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Utc::now() - self.cached_at >= window
    }
}

/// Shared cache of query results. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, CachedEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CachedEntry>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CachedEntry>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CachedEntry> {
        self.read().get(key).cloned()
    }

    /// Cached value for `key` if present and still fresh
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.entry(key)?;
        if entry.is_stale(key.stale_after()) {
            return None;
        }
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(?key, error = %e, "Dropping unreadable cache entry");
                self.invalidate(key);
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: QueryKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.write().insert(key, CachedEntry::new(value));
            }
            Err(e) => warn!(?key, error = %e, "Failed to cache query result"),
        }
    }

    /// Return the fresh cached value, or run `fetcher` and cache its result.
    /// Errors are not cached.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Some(value) = self.get(&key) {
            debug!(?key, "Cache hit");
            return Ok(value);
        }
        let value = fetcher().await?;
        self.put(key, &value);
        Ok(value)
    }

    pub fn invalidate(&self, key: &QueryKey) {
        if self.write().remove(key).is_some() {
            debug!(?key, "Invalidated");
        }
    }

    pub fn invalidate_where<F>(&self, mut predicate: F)
    where
        F: FnMut(&QueryKey) -> bool,
    {
        self.write().retain(|key, _| !predicate(key));
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.read().contains_key(key)
    }

    /// Age of the cached value for `key`, for status display
    pub fn age_display(&self, key: &QueryKey) -> Option<String> {
        self.entry(key).map(|e| e.age_display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_staleness_windows() {
        assert_eq!(QueryKey::TopCoins(50).stale_after(), Duration::from_secs(30));
        assert_eq!(
            QueryKey::PriceHistory("bitcoin".into(), TimeRange::Week).stale_after(),
            Duration::from_secs(60)
        );
        assert_eq!(QueryKey::GainersLosers.stale_after(), Duration::from_secs(300));
        assert_eq!(QueryKey::ChatSession("1".into()).stale_after(), Duration::from_secs(300));
        assert_eq!(QueryKey::PopularQueries.stale_after(), Duration::from_secs(600));
    }

    #[test]
    fn test_entry_staleness() {
        let mut entry = CachedEntry::new(Value::Null);
        assert!(!entry.is_stale(Duration::from_secs(30)));
        assert_eq!(entry.age_display(), "just now");

        entry.cached_at = Utc::now() - chrono::Duration::seconds(45);
        assert!(entry.is_stale(Duration::from_secs(30)));
        assert!(!entry.is_stale(Duration::from_secs(60)));
        assert_eq!(entry.age_display(), "45s ago");

        entry.cached_at = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(entry.age_display(), "5m ago");
    }

    #[test]
    fn test_stale_entries_not_returned() {
        let cache = QueryCache::new();
        cache.put(QueryKey::MarketData, &vec![1, 2, 3]);
        assert_eq!(cache.get::<Vec<i32>>(&QueryKey::MarketData), Some(vec![1, 2, 3]));

        cache
            .write()
            .get_mut(&QueryKey::MarketData)
            .unwrap()
            .cached_at = Utc::now() - chrono::Duration::seconds(31);
        assert_eq!(cache.get::<Vec<i32>>(&QueryKey::MarketData), None);
        // Still present for age display
        assert!(cache.contains(&QueryKey::MarketData));
    }

    #[tokio::test]
    async fn test_fetch_caches_success_only() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);

        let err = cache
            .fetch(QueryKey::Watchlist, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Vec<String>, _>(ApiError::network())
            })
            .await;
        assert!(err.is_err());
        assert!(!cache.contains(&QueryKey::Watchlist));

        for _ in 0..2 {
            let value = cache
                .fetch(QueryKey::Watchlist, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["bitcoin".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["bitcoin".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_where() {
        let cache = QueryCache::new();
        cache.put(QueryKey::CoinDetail("bitcoin".into()), &1);
        cache.put(QueryKey::PriceHistory("bitcoin".into(), TimeRange::Day), &2);
        cache.put(QueryKey::CoinDetail("ethereum".into()), &3);

        cache.invalidate_where(|k| k.concerns_coin("bitcoin"));
        assert!(!cache.contains(&QueryKey::CoinDetail("bitcoin".into())));
        assert!(!cache.contains(&QueryKey::PriceHistory("bitcoin".into(), TimeRange::Day)));
        assert!(cache.contains(&QueryKey::CoinDetail("ethereum".into())));
    }
}

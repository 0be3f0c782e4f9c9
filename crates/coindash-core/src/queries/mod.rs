//! Data-access queries with caching and invalidation.
//!
//! Each query reads through `QueryCache`; mutations invalidate the keys
//! whose data they change.

pub mod cache;
pub mod chat;
pub mod coins;

pub use cache::{CachedEntry, QueryCache, QueryKey, POLL_INTERVAL};
pub use chat::ChatQueries;
pub use coins::{CoinQueries, DEFAULT_NEWS_LIMIT, DEFAULT_TOP_COINS};

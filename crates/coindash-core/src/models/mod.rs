//! Data models for backend records.
//!
//! These are transient view models deserialized from the REST API:
//!
//! - `User` and the auth request/response bodies
//! - `Coin`, `CoinDetail`, `PriceHistory`, `MarketData`, `GainersLosers`
//! - `WatchlistItem`, `PortfolioEntry`
//! - `ChatMessage`, `ChatSession`, `ChatRequest`, `ChatResponse`
//! - `NewsArticle`

pub mod chat;
pub mod coin;
pub mod news;
pub mod portfolio;
pub mod user;

use serde::{Deserialize, Deserializer};

pub use chat::{ChatMessage, ChatMetadata, ChatRequest, ChatResponse, ChatRole, ChatSession};
pub use coin::{
    resolve_watchlist, Coin, CoinDetail, GainersLosers, MarketData, PriceHistory, PricePoint,
    SearchResult, TimeRange, WatchlistItem,
};
pub use news::{NewsArticle, Sentiment};
pub use portfolio::{NewPortfolioEntry, PortfolioEntry, PortfolioSummary, PortfolioUpdate};
pub use user::{
    AuthTokens, ChangePasswordRequest, LoginRequest, ProfileUpdate, RefreshRequest,
    RegisterRequest, ResetPasswordRequest, User,
};

/// Backend ids arrive as strings or integers depending on the table.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

//! Core library for coindash.
//!
//! - `api`: the token gateway (`ApiClient`), error taxonomy, response
//!   envelopes and cancellation
//! - `auth`: credential persistence, JWT inspection and `SessionStore`
//! - `queries`: cached data access for coins, watchlist, portfolio and chat
//! - `models`: backend records
//! - `config`, `preferences`, `utils`

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod preferences;
pub mod queries;
pub mod utils;

pub use api::{
    ApiClient, ApiError, ApiResult, CancellationReceiver, CancellationToken, ErrorKind,
    GatewayEvent,
};
pub use auth::{
    CredentialPair, CredentialStore, KeyValueStore, SessionSnapshot, SessionStatus, SessionStore,
};
pub use config::Config;
pub use preferences::Theme;
pub use queries::{ChatQueries, CoinQueries, QueryCache, QueryKey};

//! Backend API access.

pub mod cancel;
pub mod client;
pub mod envelope;
pub mod error;

pub use cancel::{CancellationReceiver, CancellationToken};
pub use client::{ApiClient, GatewayEvent};
pub use envelope::{normalize_list, normalize_price_history, ListEnvelope};
pub use error::{ApiError, ApiResult, ErrorKind};

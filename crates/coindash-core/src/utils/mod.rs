//! Display formatting helpers.

pub mod format;

pub use format::{
    format_coin_name, format_coin_symbol, format_currency, format_date, format_market_cap,
    format_number, format_percentage, format_price_change, format_relative_time,
    format_signed_percentage, format_timestamp, format_volume, truncate,
};

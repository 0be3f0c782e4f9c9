//! Normalization of response envelopes at the API boundary.
//!
//! Different backend versions wrap list responses differently. Callers
//! go through `normalize_list` instead of sniffing shapes themselves.

use chrono::{DateTime, NaiveDate};
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;

use crate::models::PricePoint;

/// Which envelope a list arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEnvelope<T> {
    /// `[...]`
    Bare(Vec<T>),
    /// `{"results": [...]}`
    Results(Vec<T>),
    /// `{"data": [...]}`
    Data(Vec<T>),
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Results(items) | ListEnvelope::Data(items) => {
                items
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Results(items) | ListEnvelope::Data(items) => {
                items.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a list response in any of the known envelopes.
pub fn normalize_list<T: DeserializeOwned>(value: Value) -> Result<ListEnvelope<T>, serde_json::Error> {
    match value {
        Value::Array(_) => Ok(ListEnvelope::Bare(serde_json::from_value(value)?)),
        Value::Object(mut map) => {
            if let Some(results) = map.remove("results") {
                Ok(ListEnvelope::Results(serde_json::from_value(results)?))
            } else if let Some(data) = map.remove("data") {
                Ok(ListEnvelope::Data(serde_json::from_value(data)?))
            } else {
                Err(serde_json::Error::custom(
                    "expected a list or an object with `results` or `data`",
                ))
            }
        }
        other => Err(serde_json::Error::custom(format!(
            "expected a list, got {}",
            value_kind(&other)
        ))),
    }
}

/// Extract chart samples from a price-history body.
///
/// Accepts `{"prices": [[ts, price], ...]}` as well as
/// `{"prices": [{"timestamp": ts, "price": p}, ...]}`. Timestamps may be
/// epoch milliseconds or date strings; unparseable timestamps become 0.
/// Samples without a numeric price are dropped.
pub fn normalize_price_history(value: &Value) -> Vec<PricePoint> {
    let Some(raw) = value.get("prices").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw.iter()
        .filter_map(|sample| {
            let (ts, price) = match sample {
                Value::Array(pair) => (pair.first()?, pair.get(1)?),
                Value::Object(obj) => (obj.get("timestamp")?, obj.get("price")?),
                _ => return None,
            };
            Some(PricePoint {
                timestamp: parse_timestamp(ts),
                price: parse_number(price)?,
            })
        })
        .collect()
}

fn parse_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => parse_date_millis(s).unwrap_or(0),
        _ => 0,
    }
}

fn parse_date_millis(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_list() {
        let env: ListEnvelope<String> = normalize_list(json!(["a", "b"])).unwrap();
        assert_eq!(env, ListEnvelope::Bare(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_results_envelope() {
        let env: ListEnvelope<u32> = normalize_list(json!({"results": [1, 2], "count": 2})).unwrap();
        assert_eq!(env, ListEnvelope::Results(vec![1, 2]));
    }

    #[test]
    fn test_data_envelope() {
        let env: ListEnvelope<u32> = normalize_list(json!({"data": [3], "success": true})).unwrap();
        assert_eq!(env.into_vec(), vec![3]);
    }

    #[test]
    fn test_results_wins_over_data() {
        let env: ListEnvelope<u32> = normalize_list(json!({"results": [1], "data": [2]})).unwrap();
        assert_eq!(env, ListEnvelope::Results(vec![1]));
    }

    #[test]
    fn test_unknown_shapes_rejected() {
        assert!(normalize_list::<u32>(json!({"items": [1]})).is_err());
        let err = normalize_list::<u32>(json!("nope")).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn test_price_history_pairs() {
        let points = normalize_price_history(&json!({
            "prices": [[1714521600000_i64, 60000.5], [1714525200000_i64, "60100.25"]]
        }));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1714521600000);
        assert_eq!(points[1].price, 60100.25);
    }

    #[test]
    fn test_price_history_objects_and_dates() {
        let points = normalize_price_history(&json!({
            "prices": [
                {"timestamp": "2024-05-01T00:00:00Z", "price": 1.0},
                {"timestamp": "2024-05-02", "price": 2.0},
                {"timestamp": "yesterday", "price": 3.0},
                {"timestamp": 5, "price": null},
                "garbage"
            ]
        }));
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].timestamp, 1714521600000);
        assert_eq!(points[1].timestamp, 1714608000000);
        assert_eq!(points[2].timestamp, 0);
    }

    #[test]
    fn test_price_history_missing_prices() {
        assert!(normalize_price_history(&json!({})).is_empty());
        assert!(normalize_price_history(&json!({"prices": "none"})).is_empty());
    }
}

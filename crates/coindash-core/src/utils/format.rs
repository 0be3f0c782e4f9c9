use chrono::{DateTime, NaiveDate, Utc};

/// Insert thousands separators into the integer part of a decimal string
fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}

/// Fixed-point with trailing zeros trimmed, keeping at least `min` decimals
fn trim_decimals(value: f64, min: usize, max: usize) -> String {
    let mut s = format!("{:.*}", max, value);
    if let Some(dot) = s.find('.') {
        let keep = dot + 1 + min;
        while s.len() > keep && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// Format a USD amount: `$1,234.50`, small prices keep up to 8 decimals
pub fn format_currency(value: f64) -> String {
    let body = group_thousands(&trim_decimals(value.abs(), 2, 8));
    if value < 0.0 {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Compact notation: 1.23K, 4.5M, 2B, 1.1T
pub fn format_number(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (value / 1e12, "T")
    } else if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else if abs >= 1e3 {
        (value / 1e3, "K")
    } else {
        (value, "")
    };
    format!("{}{}", trim_decimals(scaled, 0, 2), suffix)
}

/// `value` is already a percentage: 2.5 -> "2.5%"
pub fn format_percentage(value: f64) -> String {
    format!("{}%", trim_decimals(value, 0, 2))
}

/// Percentage with an explicit sign for positive values
pub fn format_signed_percentage(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", format_percentage(value))
    } else {
        format_percentage(value)
    }
}

fn format_scaled_dollars(value: f64, units: &[(f64, &str)]) -> String {
    for (threshold, suffix) in units {
        if value >= *threshold {
            return format!("${:.2}{}", value / threshold, suffix);
        }
    }
    format!("${:.2}", value)
}

pub fn format_market_cap(value: f64) -> String {
    format_scaled_dollars(value, &[(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")])
}

pub fn format_volume(value: f64) -> String {
    format_scaled_dollars(value, &[(1e9, "B"), (1e6, "M"), (1e3, "K")])
}

/// `+$12.50 (2.5%)`
pub fn format_price_change(value: f64, percentage: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!(
        "{}{} ({})",
        sign,
        format_currency(value),
        format_percentage(percentage)
    )
}

pub fn format_coin_symbol(symbol: &str) -> String {
    symbol.to_uppercase()
}

/// "Bitcoin (BTC)"
pub fn format_coin_name(name: &str, symbol: &str) -> String {
    format!("{} ({})", name, format_coin_symbol(symbol))
}

fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Format a date string as "May 01, 2024"; unparseable input is returned as-is
pub fn format_date(date: &str) -> String {
    parse_date(date)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| date.to_string())
}

/// Chart axis label for an epoch-millisecond timestamp
pub fn format_timestamp(millis: i64, with_time: bool) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) if with_time => dt.format("%b %d %H:%M").to_string(),
        Some(dt) => dt.format("%b %d").to_string(),
        None => String::new(),
    }
}

/// "5 minutes ago", "about 2 hours ago", "in 3 days"
pub fn format_relative_time(date: &str) -> String {
    match parse_date(date) {
        Some(dt) => relative_to(dt, Utc::now()),
        None => date.to_string(),
    }
}

fn relative_to(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - dt).num_seconds();
    let future = seconds < 0;
    let seconds = seconds.abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    let distance = if seconds < 30 {
        "less than a minute".to_string()
    } else if minutes < 2 {
        "1 minute".to_string()
    } else if minutes < 45 {
        format!("{} minutes", minutes)
    } else if minutes < 90 {
        "about 1 hour".to_string()
    } else if minutes < 24 * 60 {
        format!("about {} hours", (minutes as f64 / 60.0).round() as i64)
    } else if minutes < 42 * 60 {
        "1 day".to_string()
    } else if minutes < 30 * 24 * 60 {
        format!("{} days", (minutes as f64 / 1440.0).round() as i64)
    } else if minutes < 45 * 24 * 60 {
        "about 1 month".to_string()
    } else if minutes < 365 * 24 * 60 {
        format!("{} months", (minutes as f64 / 43200.0).round() as i64)
    } else {
        let years = minutes / (365 * 24 * 60);
        if years == 1 {
            "about 1 year".to_string()
        } else {
            format!("about {} years", years)
        }
    };

    if future {
        format!("in {}", distance)
    } else {
        format!("{} ago", distance)
    }
}

/// Truncate a string to a maximum number of characters, adding an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(60000.0), "$60,000.00");
        assert_eq!(format_currency(0.00001234), "$0.00001234");
        assert_eq!(format_currency(-12.0), "-$12.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.891");
    }

    #[test]
    fn test_format_number_compact() {
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1234.0), "1.23K");
        assert_eq!(format_number(1_500_000.0), "1.5M");
        assert_eq!(format_number(2_000_000_000.0), "2B");
        assert_eq!(format_number(12.346), "12.35");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(2.5), "2.5%");
        assert_eq!(format_percentage(-3.456), "-3.46%");
        assert_eq!(format_signed_percentage(1.0), "+1%");
        assert_eq!(format_signed_percentage(-1.0), "-1%");
    }

    #[test]
    fn test_format_market_cap_and_volume() {
        assert_eq!(format_market_cap(1.2e12), "$1.20T");
        assert_eq!(format_market_cap(3.5e9), "$3.50B");
        assert_eq!(format_market_cap(999.0), "$999.00");
        assert_eq!(format_volume(1.2e12), "$1200.00B");
        assert_eq!(format_volume(45_000.0), "$45.00K");
    }

    #[test]
    fn test_format_price_change() {
        assert_eq!(format_price_change(12.5, 2.5), "+$12.50 (2.5%)");
        assert_eq!(format_price_change(-12.5, -2.5), "-$12.50 (-2.5%)");
    }

    #[test]
    fn test_coin_names() {
        assert_eq!(format_coin_symbol("btc"), "BTC");
        assert_eq!(format_coin_name("Bitcoin", "btc"), "Bitcoin (BTC)");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-05-01T12:00:00Z"), "May 01, 2024");
        assert_eq!(format_date("2024-05-01"), "May 01, 2024");
        assert_eq!(format_date("soon"), "soon");
    }

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        assert_eq!(relative_to(now - Duration::seconds(10), now), "less than a minute ago");
        assert_eq!(relative_to(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(relative_to(now - Duration::hours(3), now), "about 3 hours ago");
        assert_eq!(relative_to(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_to(now + Duration::minutes(10), now), "in 10 minutes");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Ünïcödé text", 6), "Ünï...");
    }
}

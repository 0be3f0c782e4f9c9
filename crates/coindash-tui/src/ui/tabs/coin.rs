use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};

use coindash_core::models::{PriceHistory, TimeRange};
use coindash_core::utils::{
    format_coin_name, format_currency, format_market_cap, format_relative_time,
    format_signed_percentage, format_timestamp, format_volume, truncate,
};

use crate::app::App;
use crate::ui::styles;

use super::{or_dash, render_placeholder, render_tab_error};

const DESCRIPTION_CHARS: usize = 400;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(coin_id) = app.selected_coin.as_deref() else {
        render_placeholder(
            frame,
            area,
            "Coin",
            "Select a coin on the dashboard or watchlist, or press / to search",
        );
        return;
    };

    if render_tab_error(frame, app, area) {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // Header
            Constraint::Min(12),    // Chart
            Constraint::Length(10), // Detail and news
        ])
        .split(area);

    render_header(frame, app, coin_id, rows[0]);
    render_chart(frame, app, rows[1]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);

    render_detail(frame, app, bottom[0]);
    render_news(frame, app, bottom[1]);
}

fn render_header(frame: &mut Frame, app: &App, coin_id: &str, area: Rect) {
    let title = match (&app.coin, &app.coin_detail) {
        (Some(coin), _) => format_coin_name(&coin.name, &coin.symbol),
        (None, Some(detail)) => format_coin_name(&detail.name, &detail.symbol),
        (None, None) => coin_id.to_string(),
    };

    let mut price_line = vec![Span::raw(" ")];
    if let Some(coin) = &app.coin {
        price_line.push(Span::styled(
            or_dash(coin.current_price.map(format_currency)),
            styles::title_style(),
        ));
        if let Some(change) = coin.price_change_percentage_24h {
            price_line.push(Span::raw("  "));
            price_line.push(Span::styled(
                format!("{} 24h", format_signed_percentage(change)),
                styles::change_style(change),
            ));
        }
        price_line.push(Span::styled("   High ", styles::muted_style()));
        price_line.push(Span::raw(or_dash(coin.high_24h.map(format_currency))));
        price_line.push(Span::styled("  Low ", styles::muted_style()));
        price_line.push(Span::raw(or_dash(coin.low_24h.map(format_currency))));
        price_line.push(Span::styled("  Cap ", styles::muted_style()));
        price_line.push(Span::raw(or_dash(coin.market_cap.map(format_market_cap))));
        price_line.push(Span::styled("  Vol ", styles::muted_style()));
        price_line.push(Span::raw(or_dash(coin.total_volume.map(format_volume))));
    } else {
        price_line.push(Span::styled("Loading quote...", styles::muted_style()));
    }

    let mut ranges = vec![Span::raw(" ")];
    for range in TimeRange::ALL {
        let style = if range == app.time_range {
            styles::tab_style(true)
        } else {
            styles::muted_style()
        };
        ranges.push(Span::styled(range.label(), style));
        ranges.push(Span::raw("  "));
    }
    ranges.push(Span::styled("[ / ] range   [w] watch", styles::muted_style()));

    let block = Block::default()
        .title(format!(" {} ", title))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(vec![Line::from(price_line), Line::from(ranges)]).block(block);
    frame.render_widget(paragraph, area);
}

/// Y axis bounds with a little headroom; flat series get a unit band.
fn price_bounds(history: &PriceHistory) -> Option<[f64; 2]> {
    let (lo, hi) = history.bounds()?;
    if hi - lo <= f64::EPSILON {
        return Some([lo - 1.0, hi + 1.0]);
    }
    let pad = (hi - lo) * 0.05;
    Some([(lo - pad).max(0.0), hi + pad])
}

fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let Some(history) = app.price_history.as_ref().filter(|h| !h.points.is_empty()) else {
        let message = if app.price_history.is_some() {
            "No price data for this range"
        } else {
            "Loading chart..."
        };
        render_placeholder(frame, area, app.time_range.label(), message);
        return;
    };
    let Some(y_bounds) = price_bounds(history) else {
        return;
    };

    let data: Vec<(f64, f64)> = history
        .points
        .iter()
        .map(|p| (p.timestamp as f64, p.price))
        .collect();
    let first = history.points[0].timestamp;
    let last = history.points[history.points.len() - 1].timestamp;
    let with_time = app.time_range == TimeRange::Day;

    let change = history.change_percentage().unwrap_or(0.0);
    let line_style: Style = styles::change_style(change);

    let dataset = Dataset::default()
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(line_style)
        .data(&data);

    let x_axis = Axis::default()
        .style(styles::muted_style())
        .bounds([first as f64, (last as f64).max(first as f64 + 1.0)])
        .labels(vec![
            format_timestamp(first, with_time),
            format_timestamp(last, with_time),
        ]);

    let y_axis = Axis::default()
        .style(styles::muted_style())
        .bounds(y_bounds)
        .labels(vec![format_currency(y_bounds[0]), format_currency(y_bounds[1])]);

    let block = Block::default()
        .title(format!(
            " {} {} ",
            app.time_range.label(),
            format_signed_percentage(change)
        ))
        .title_style(styles::change_style(change))
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis);
    frame.render_widget(chart, area);
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if let Some(detail) = &app.coin_detail {
        if let Some(description) = detail.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(truncate(description, DESCRIPTION_CHARS)));
            lines.push(Line::from(""));
        }
        if let Some(homepage) = &detail.homepage {
            lines.push(Line::from(vec![
                Span::styled("Homepage: ", styles::highlight_style()),
                Span::raw(homepage.clone()),
            ]));
        }
        for (key, value) in detail.extra_fields() {
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", key), styles::muted_style()),
                Span::raw(value),
            ]));
        }
    } else {
        lines.push(Line::from(Span::styled("Loading...", styles::muted_style())));
    }

    let block = Block::default()
        .title(" About ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_news(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let mut lines = Vec::new();
    for article in &app.coin_news {
        lines.push(Line::from(format!(" {}", truncate(&article.title, width))));
        if let Some(published) = article.published_at.as_deref() {
            lines.push(Line::from(Span::styled(
                format!("   {}", format_relative_time(published)),
                styles::muted_style(),
            )));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(" No recent news", styles::muted_style())));
    }

    let block = Block::default()
        .title(" News ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use coindash_core::models::PricePoint;

    fn history(prices: &[f64]) -> PriceHistory {
        PriceHistory {
            coin_id: "bitcoin".to_string(),
            range: TimeRange::Week,
            points: prices
                .iter()
                .enumerate()
                .map(|(i, p)| PricePoint {
                    timestamp: i as i64 * 1000,
                    price: *p,
                })
                .collect(),
        }
    }

    #[test]
    fn test_price_bounds_padding() {
        let bounds = price_bounds(&history(&[100.0, 200.0, 150.0])).unwrap();
        assert_eq!(bounds, [95.0, 205.0]);
    }

    #[test]
    fn test_price_bounds_flat_series() {
        assert_eq!(price_bounds(&history(&[5.0, 5.0])).unwrap(), [4.0, 6.0]);
        assert!(price_bounds(&history(&[])).is_none());
    }
}

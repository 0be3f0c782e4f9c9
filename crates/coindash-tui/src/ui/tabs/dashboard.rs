use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use coindash_core::models::Coin;
use coindash_core::utils::{
    format_coin_symbol, format_currency, format_market_cap, format_number,
    format_relative_time, format_signed_percentage, format_volume, truncate,
};

use crate::app::App;
use crate::ui::styles;

use super::{or_dash, render_placeholder, render_tab_error};

const MOVERS_SHOWN: usize = 5;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if render_tab_error(frame, app, area) {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(8)])
        .split(area);

    render_market_overview(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(rows[1]);

    render_top_coins(frame, app, columns[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);

    render_movers(frame, app, side[0]);
    render_news(frame, app, side[1]);
}

fn render_market_overview(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Market ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let Some(market) = &app.market else {
        let paragraph = Paragraph::new(Span::styled(" Loading market data...", styles::muted_style()))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    };

    let change = market.market_cap_change_percentage_24h;
    let mut figures = vec![
        Span::styled(" Market cap ", styles::muted_style()),
        Span::raw(or_dash(market.total_market_cap.map(format_market_cap))),
    ];
    if let Some(change) = change {
        figures.push(Span::raw(" "));
        figures.push(Span::styled(
            format_signed_percentage(change),
            styles::change_style(change),
        ));
    }
    figures.extend([
        Span::styled("   24h volume ", styles::muted_style()),
        Span::raw(or_dash(market.total_volume.map(format_volume))),
        Span::styled("   BTC dominance ", styles::muted_style()),
        Span::raw(or_dash(
            market.btc_dominance.map(|d| format!("{:.1}%", d)),
        )),
        Span::styled("   Coins ", styles::muted_style()),
        Span::raw(or_dash(
            market.active_cryptocurrencies.map(|n| format_number(n as f64)),
        )),
    ]);

    let trending: Vec<String> = app
        .trending
        .iter()
        .take(7)
        .map(|c| format_coin_symbol(&c.symbol))
        .collect();
    let trending_line = Line::from(vec![
        Span::styled(" Trending ", styles::muted_style()),
        Span::styled(
            if trending.is_empty() {
                "-".to_string()
            } else {
                trending.join("  ")
            },
            styles::highlight_style(),
        ),
    ]);

    let paragraph = Paragraph::new(vec![Line::from(figures), trending_line]).block(block);
    frame.render_widget(paragraph, area);
}

fn change_cell(coin: &Coin) -> Cell<'static> {
    match coin.price_change_percentage_24h {
        Some(change) => Cell::from(Span::styled(
            format_signed_percentage(change),
            styles::change_style(change),
        )),
        None => Cell::from("-"),
    }
}

fn render_top_coins(frame: &mut Frame, app: &App, area: Rect) {
    if app.top_coins.is_empty() {
        let message = if app.loading {
            "Loading..."
        } else {
            "No coins available"
        };
        render_placeholder(frame, area, "Top Coins", message);
        return;
    }

    let header = Row::new(vec!["#", "Coin", "Price", "24h", "Market Cap"])
        .style(styles::header_style());

    let rows: Vec<Row> = app
        .top_coins
        .iter()
        .enumerate()
        .map(|(i, coin)| {
            let rank = coin
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| (i + 1).to_string());
            Row::new(vec![
                Cell::from(rank),
                Cell::from(format!(
                    "{} {}",
                    truncate(&coin.name, 16),
                    format_coin_symbol(&coin.symbol)
                )),
                Cell::from(or_dash(coin.current_price.map(format_currency))),
                change_cell(coin),
                Cell::from(or_dash(coin.market_cap.map(format_market_cap))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(18),
        Constraint::Length(16),
        Constraint::Length(9),
        Constraint::Length(11),
    ];

    let block = Block::default()
        .title(format!(" Top Coins ({}) ", app.top_coins.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style(app.theme));

    let mut state = TableState::default();
    state.select(Some(app.dashboard_selection));
    frame.render_stateful_widget(table, area, &mut state);
}

fn mover_line(coin: &Coin) -> Line<'static> {
    let change = coin.price_change_percentage_24h.unwrap_or(0.0);
    Line::from(vec![
        Span::raw(format!("  {:<8}", format_coin_symbol(&coin.symbol))),
        Span::raw(format!(
            "{:>14} ",
            or_dash(coin.current_price.map(format_currency))
        )),
        Span::styled(format_signed_percentage(change), styles::change_style(change)),
    ])
}

fn render_movers(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(" Gainers", styles::success_style()))];
    lines.extend(app.movers.gainers.iter().take(MOVERS_SHOWN).map(mover_line));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Losers", styles::error_style())));
    lines.extend(app.movers.losers.iter().take(MOVERS_SHOWN).map(mover_line));

    let block = Block::default()
        .title(" 24h Movers ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_news(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let mut lines = Vec::new();
    for article in &app.news {
        lines.push(Line::from(Span::raw(format!(" {}", truncate(&article.title, width)))));
        let published = article
            .published_at
            .as_deref()
            .map(format_relative_time)
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("   {} {}", article.source, published),
            styles::muted_style(),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(" No news", styles::muted_style())));
    }

    let block = Block::default()
        .title(" News ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

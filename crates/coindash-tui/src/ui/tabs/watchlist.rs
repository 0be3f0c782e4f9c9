use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use coindash_core::utils::{
    format_coin_symbol, format_currency, format_market_cap, format_signed_percentage,
    format_volume, truncate,
};

use crate::app::App;
use crate::ui::styles;

use super::{or_dash, render_placeholder, render_tab_error};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if render_tab_error(frame, app, area) {
        return;
    }

    if app.watchlist.is_empty() {
        let message = if app.loading {
            "Loading..."
        } else {
            "Your watchlist is empty. Press [w] on a coin to watch it."
        };
        render_placeholder(frame, area, "Watchlist", message);
        return;
    }

    let header = Row::new(vec!["Coin", "Price", "24h", "High", "Low", "Volume", "Market Cap"])
        .style(styles::header_style());

    let rows: Vec<Row> = app
        .watchlist
        .iter()
        .map(|coin| {
            let change = match coin.price_change_percentage_24h {
                Some(change) => Cell::from(Span::styled(
                    format_signed_percentage(change),
                    styles::change_style(change),
                )),
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(format!(
                    "{} {}",
                    truncate(&coin.name, 16),
                    format_coin_symbol(&coin.symbol)
                )),
                Cell::from(or_dash(coin.current_price.map(format_currency))),
                change,
                Cell::from(or_dash(coin.high_24h.map(format_currency))),
                Cell::from(or_dash(coin.low_24h.map(format_currency))),
                Cell::from(or_dash(coin.total_volume.map(format_volume))),
                Cell::from(or_dash(coin.market_cap.map(format_market_cap))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(20),
        Constraint::Length(16),
        Constraint::Length(9),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Length(11),
        Constraint::Length(11),
    ];

    let block = Block::default()
        .title(format!(" Watchlist ({})  [Enter] open  [d] remove ", app.watchlist.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style(app.theme));

    let mut state = TableState::default();
    state.select(Some(app.watchlist_selection));
    frame.render_stateful_widget(table, area, &mut state);
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use coindash_core::models::PortfolioSummary;
use coindash_core::utils::{format_currency, format_number, format_signed_percentage};

use crate::app::{App, AppState};
use crate::ui::styles;

use super::{or_dash, render_placeholder, render_tab_error};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if render_tab_error(frame, app, area) {
        return;
    }

    let editing = app.state == AppState::EditingPortfolio;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(if editing { 3 } else { 0 }),
        ])
        .split(area);

    render_summary(frame, app, rows[0]);
    render_entries(frame, app, rows[1]);
    if editing {
        render_input(frame, app, rows[2]);
    }
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary = PortfolioSummary::from_entries(&app.portfolio, &app.portfolio_prices);
    let profit = summary.profit_loss();

    let mut spans = vec![
        Span::styled(" Value ", styles::muted_style()),
        Span::styled(format_currency(summary.market_value), styles::title_style()),
        Span::styled("   Cost ", styles::muted_style()),
        Span::raw(format_currency(summary.cost_basis)),
        Span::styled("   P/L ", styles::muted_style()),
        Span::styled(format_currency(profit), styles::change_style(profit)),
    ];
    if let Some(pct) = summary.profit_loss_percentage() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("({})", format_signed_percentage(pct)),
            styles::change_style(pct),
        ));
    }

    let block = Block::default()
        .title(" Portfolio ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let hint = Line::from(Span::styled(
        " [a] add  [e] edit  [d] remove",
        styles::muted_style(),
    ));
    frame.render_widget(Paragraph::new(vec![Line::from(spans), hint]).block(block), area);
}

fn render_entries(frame: &mut Frame, app: &App, area: Rect) {
    if app.portfolio.is_empty() {
        let message = if app.loading {
            "Loading..."
        } else {
            "No holdings yet. Press [a] to add one."
        };
        render_placeholder(frame, area, "Holdings", message);
        return;
    }

    let header = Row::new(vec!["Coin", "Amount", "Buy Price", "Price", "Value", "P/L"])
        .style(styles::header_style());

    let rows: Vec<Row> = app
        .portfolio
        .iter()
        .map(|entry| {
            let current = entry.current_price(&app.portfolio_prices);
            let profit = current.map(|p| entry.profit_loss(p));
            let profit_cell = match profit {
                Some(pl) => Cell::from(Span::styled(format_currency(pl), styles::change_style(pl))),
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(entry.coin_id.clone()),
                Cell::from(format_number(entry.amount)),
                Cell::from(format_currency(entry.price)),
                Cell::from(or_dash(current.map(format_currency))),
                Cell::from(or_dash(current.map(|p| format_currency(entry.market_value(p))))),
                profit_cell,
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(14),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Length(14),
    ];

    let block = Block::default()
        .title(format!(" Holdings ({}) ", app.portfolio.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style(app.theme));

    let mut state = TableState::default();
    state.select(Some(app.portfolio_selection));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let prompt = if app.editing_entry.is_some() {
        " amount price: "
    } else {
        " coin amount price: "
    };

    let line = Line::from(vec![
        Span::styled(prompt, styles::search_style()),
        Span::raw(format!("{}▌", app.portfolio_input)),
    ]);

    let block = Block::default()
        .title(" Enter to save, Esc to cancel ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

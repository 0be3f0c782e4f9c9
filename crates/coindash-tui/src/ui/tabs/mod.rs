//! Per-tab content rendering.

pub mod chat;
pub mod coin;
pub mod dashboard;
pub mod portfolio;
pub mod watchlist;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

/// Error panel with a retry hint, shown when a tab's fetch failed.
/// Returns false when the tab has no error.
pub fn render_tab_error(frame: &mut Frame, app: &App, area: Rect) -> bool {
    let Some(message) = app.tab_errors.get(&app.current_tab) else {
        return false;
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", message), styles::error_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[r]", styles::help_key_style()),
            Span::styled(" to retry", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(format!(" {} ", app.current_tab.title()))
        .title_style(styles::error_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
    true
}

/// Bordered panel holding a single muted message
pub fn render_placeholder(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(Line::from(Span::styled(
        format!("  {}", message),
        styles::muted_style(),
    )))
    .block(block);
    frame.render_widget(paragraph, area);
}

/// Placeholder for missing figures
pub fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

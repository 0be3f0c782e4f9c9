use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use coindash_core::models::{ChatMessage, ChatRole};
use coindash_core::utils::{format_relative_time, truncate};

use crate::app::{App, AppState};
use crate::ui::styles;

use super::render_tab_error;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(area);

    if !render_tab_error(frame, app, columns[0]) {
        render_sessions(frame, app, columns[0]);
    }

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(columns[1]);

    render_messages(frame, app, right[0]);
    render_input(frame, app, right[1]);
}

fn render_sessions(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = app
        .chat_sessions
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let active = app.chat_session_id.as_deref() == Some(session.id.as_str());
            let marker = if active { "● " } else { "  " };
            let title = if session.title.is_empty() {
                "Untitled"
            } else {
                session.title.as_str()
            };
            let style = if i == app.chat_session_selection {
                styles::selected_style(app.theme)
            } else {
                styles::list_item_style()
            };
            let mut lines = vec![Line::from(format!("{}{}", marker, truncate(title, width)))];
            if let Some(updated) = session.updated_at.as_deref().or(session.created_at.as_deref()) {
                lines.push(Line::from(Span::styled(
                    format!("  {}", format_relative_time(updated)),
                    styles::muted_style(),
                )));
            }
            ListItem::new(lines).style(style)
        })
        .collect();

    let block = Block::default()
        .title(format!(" Conversations ({}) ", app.chat_sessions.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.state != AppState::Composing));

    let mut state = ListState::default();
    state.select(Some(app.chat_session_selection));
    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn message_lines(message: &ChatMessage) -> Vec<Line<'static>> {
    let (label, label_style) = match message.role {
        ChatRole::User => ("You", styles::highlight_style()),
        ChatRole::Assistant => ("Assistant", styles::title_style()),
    };
    let body_style = if message.is_error() {
        styles::error_style()
    } else {
        styles::list_item_style()
    };

    let mut lines = vec![Line::from(Span::styled(label, label_style))];
    lines.extend(
        message
            .content
            .lines()
            .map(|l| Line::from(Span::styled(format!("  {}", l), body_style))),
    );
    lines.push(Line::from(""));
    lines
}

fn render_messages(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = app.chat_messages.iter().flat_map(message_lines).collect();

    if app.chat_pending {
        lines.push(Line::from(Span::styled("Assistant is typing...", styles::muted_style())));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask about prices, trends or your portfolio.",
            styles::muted_style(),
        )));
        if !app.chat_suggestions.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Try:", styles::highlight_style())));
            for suggestion in &app.chat_suggestions {
                lines.push(Line::from(format!("  {}", suggestion)));
            }
        }
    }

    // Keep the newest messages in view
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let title = if app.chat_session_id.is_some() {
        " Chat "
    } else {
        " New chat "
    };
    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let composing = app.state == AppState::Composing;
    let line = if composing {
        Line::from(vec![
            Span::styled(" > ", styles::search_style()),
            Span::raw(format!("{}▌", app.chat_input)),
        ])
    } else {
        Line::from(Span::styled(
            " [i] write  [n] new chat  [Enter] open  [d] delete",
            styles::muted_style(),
        ))
    };

    let title = match (composing, app.chat_suggestions.first()) {
        (false, _) => String::new(),
        (true, Some(first)) => format!(" Enter to send, Tab for \"{}\" ", truncate(first, 40)),
        (true, None) => " Enter to send, Esc to stop ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(composing));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

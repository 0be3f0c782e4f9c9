use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use coindash_core::auth::jwt::minutes_until_expiry;
use coindash_core::queries::DEFAULT_TOP_COINS;
use coindash_core::utils::format_coin_symbol;
use coindash_core::QueryKey;

use crate::app::{App, AppState, LoginFocus, LoginMode, Tab};

use super::styles;
use super::tabs::{chat, coin, dashboard, portfolio, watchlist};

const LOGO: [&str; 3] = [
    "  ┏━╸┏━┓╻┏┓╻╺┳┓┏━┓┏━┓╻ ╻",
    "  ┃  ┃ ┃┃┃┗┫ ┃┃┣━┫┗━┓┣━┫",
    "  ┗━╸┗━┛╹╹ ╹╺┻┛╹ ╹┗━┛╹ ╹",
];

pub fn render(frame: &mut Frame, app: &App) {
    frame.render_widget(
        Block::default().style(styles::base_style(app.theme)),
        frame.area(),
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Searching => render_search_overlay(frame, app),
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  coindash";
    let user = app
        .session
        .user()
        .map(|u| format!("{}  ", u.display_name()))
        .unwrap_or_default();
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + user.chars().count() + help_hint.len() + 4),
        )),
        Span::styled(user, styles::highlight_style()),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        if *tab == app.current_tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    if app.loading {
        spans.push(Span::styled("   loading...", styles::muted_style()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Dashboard => dashboard::render(frame, app, area),
        Tab::Coin => coin::render(frame, app, area),
        Tab::Watchlist => watchlist::render(frame, app, area),
        Tab::Portfolio => portfolio::render(frame, app, area),
        Tab::Chat => chat::render(frame, app, area),
    }
}

/// Cache key whose age is shown for the current tab
fn age_key(app: &App) -> Option<QueryKey> {
    match app.current_tab {
        Tab::Dashboard => Some(QueryKey::TopCoins(DEFAULT_TOP_COINS)),
        Tab::Coin => app
            .selected_coin
            .clone()
            .map(|id| QueryKey::PriceHistory(id, app.time_range)),
        Tab::Watchlist => Some(QueryKey::Watchlist),
        Tab::Portfolio => Some(QueryKey::Portfolio),
        Tab::Chat => Some(QueryKey::ChatSessions),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else {
        match age_key(app).and_then(|key| app.coins.cache().age_display(&key)) {
            Some(age) => format!(" Updated {} ", age),
            None => String::new(),
        }
    };

    let session = app
        .session
        .gateway()
        .credentials()
        .and_then(|pair| minutes_until_expiry(&pair.access))
        .map(|minutes| {
            if minutes > 0 {
                format!("token {}m | ", minutes)
            } else {
                "token expired | ".to_string()
            }
        })
        .unwrap_or_default();
    let right_text = format!(" {}[t]heme [r]efresh [q]uit ", session);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style(app.theme));
    frame.render_widget(paragraph, area);
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect()
}

fn help_entry(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 29, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let mut help_text = logo_lines();
    help_text.push(Line::from(Span::styled(
        format!("              version {}", version),
        styles::muted_style(),
    )));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Navigation", styles::highlight_style())));
    help_text.push(help_entry("1-5", "Switch tabs"));
    help_text.push(help_entry("←/→", "Previous/next tab"));
    help_text.push(help_entry("↑/↓ j/k", "Move selection"));
    help_text.push(help_entry("Enter", "Open coin / conversation"));
    help_text.push(help_entry("/", "Search coins"));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Actions", styles::highlight_style())));
    help_text.push(help_entry("r", "Refresh / retry"));
    help_text.push(help_entry("w", "Add coin to watchlist"));
    help_text.push(help_entry("d", "Remove selected item"));
    help_text.push(help_entry("a / e", "Add / edit portfolio entry"));
    help_text.push(help_entry("[ / ]", "Chart range"));
    help_text.push(help_entry("i", "Write a chat message"));
    help_text.push(help_entry("n", "New conversation"));
    help_text.push(help_entry("t", "Cycle theme"));
    help_text.push(help_entry("L", "Log out"));
    help_text.push(help_entry("q", "Quit"));
    help_text.push(Line::from(""));
    help_text.push(Line::from(vec![
        Span::styled("       Press ", styles::muted_style()),
        Span::styled("?", styles::help_key_style()),
        Span::styled(" or ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" to close", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// One labelled input row of the login form
fn login_field<'a>(app: &App, label: &'a str, value: String, focus: LoginFocus) -> Line<'a> {
    let focused = app.login_focus == focus;
    let style = if focused {
        styles::selected_style(app.theme)
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("    "),
        Span::styled(format!("{:>9} [", label), styles::muted_style()),
        Span::styled(format!("{:<18}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let registering = app.login_mode == LoginMode::Register;
    let mut height = 14;
    if registering {
        height += 1;
    }
    if app.login_error.is_some() {
        height += 2;
    }
    let area = centered_rect_fixed(48, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));

    let username: String = app.login_username.chars().take(18).collect();
    lines.push(login_field(app, "Username:", username, LoginFocus::Username));

    if registering {
        let email: String = app.login_email.chars().take(18).collect();
        lines.push(login_field(app, "Email:", email, LoginFocus::Email));
    }

    let masked = "*".repeat(app.login_password.chars().count().min(18));
    lines.push(login_field(app, "Password:", masked, LoginFocus::Password));

    let action = if registering { "Register" } else { "Login" };
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style(app.theme)
    } else {
        styles::list_item_style()
    };
    let button_label = if button_focused {
        format!(" ▶ {} ◀ ", action)
    } else {
        format!("   {}   ", action)
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(button_label, button_style),
        Span::raw("]"),
    ]));

    let switch_label = if registering {
        "Have an account? Log in"
    } else {
        "New here? Create an account"
    };
    let switch_style = if app.login_focus == LoginFocus::SwitchMode {
        styles::selected_style(app.theme)
    } else {
        styles::muted_style()
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("        "),
        Span::styled(switch_label, switch_style),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(styles::base_style(app.theme));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_search_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(56, 18, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Search coins ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(styles::base_style(app.theme));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(inner);

    let query = Paragraph::new(Line::from(vec![
        Span::styled(" / ", styles::search_style()),
        Span::raw(format!("{}▌", app.search_query)),
    ]));
    frame.render_widget(query, chunks[0]);

    if app.search_results.is_empty() {
        let hint = Paragraph::new(Span::styled(
            " Enter to search, Esc to close",
            styles::muted_style(),
        ));
        frame.render_widget(hint, chunks[1]);
        return;
    }

    let items: Vec<ListItem> = app
        .search_results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let rank = result
                .market_cap_rank
                .map(|r| format!("#{}", r))
                .unwrap_or_default();
            let line = format!(
                " {:<6} {:<28} {}",
                format_coin_symbol(&result.symbol),
                result.name,
                rank
            );
            let style = if i == app.search_selection {
                styles::selected_style(app.theme)
            } else {
                styles::list_item_style()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.search_selection));
    frame.render_stateful_widget(List::new(items), chunks[1], &mut state);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 9, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Are you sure you want to quit?",
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to quit, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        let rect = centered_rect_fixed(46, 10, outer);
        assert_eq!(rect, Rect::new(27, 15, 46, 10));

        // Clamped to small terminals
        let small = Rect::new(0, 0, 30, 5);
        let rect = centered_rect_fixed(46, 10, small);
        assert_eq!(rect.width, 30);
        assert_eq!(rect.height, 5);
    }
}

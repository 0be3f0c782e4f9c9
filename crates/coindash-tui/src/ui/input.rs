//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_chat_char, can_add_email_char, can_add_password_char, can_add_portfolio_char,
    can_add_search_char, can_add_username_char, App, AppState, LoginFocus, Tab,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Composing => {
            handle_compose_input(app, key);
            return Ok(false);
        }
        AppState::EditingPortfolio => {
            handle_portfolio_input(app, key);
            return Ok(false);
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char(c @ '1'..='5') => {
            let index = c as usize - '1' as usize;
            app.switch_tab(Tab::ALL[index]);
        }
        KeyCode::Left => {
            app.switch_tab(app.current_tab.prev());
        }
        KeyCode::Right => {
            app.switch_tab(app.current_tab.next());
        }
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-10),
        KeyCode::PageDown => app.move_selection(10),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('r') => app.retry_current_tab(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('L') => app.logout().await,
        _ => handle_tab_input(app, key),
    }

    Ok(false)
}

/// Keys that only mean something on the current tab
fn handle_tab_input(app: &mut App, key: KeyEvent) {
    match (app.current_tab, key.code) {
        (Tab::Dashboard | Tab::Watchlist | Tab::Portfolio, KeyCode::Enter) => {
            if let Some(id) = app.highlighted_coin_id() {
                app.open_coin(&id);
            }
        }
        (Tab::Dashboard | Tab::Coin, KeyCode::Char('w')) => {
            if let Some(id) = app.highlighted_coin_id() {
                app.add_to_watchlist(id);
            }
        }
        (Tab::Coin, KeyCode::Char('[')) => {
            let range = app.time_range.prev();
            app.set_time_range(range);
        }
        (Tab::Coin, KeyCode::Char(']')) => {
            let range = app.time_range.next();
            app.set_time_range(range);
        }
        (Tab::Watchlist, KeyCode::Char('d') | KeyCode::Delete) => {
            app.remove_selected_from_watchlist();
        }
        (Tab::Portfolio, KeyCode::Char('a')) => app.start_portfolio_edit(false),
        (Tab::Portfolio, KeyCode::Char('e')) => app.start_portfolio_edit(true),
        (Tab::Portfolio, KeyCode::Char('d') | KeyCode::Delete) => {
            app.remove_selected_portfolio_entry();
        }
        (Tab::Chat, KeyCode::Char('i')) => {
            app.state = AppState::Composing;
        }
        (Tab::Chat, KeyCode::Char('n')) => {
            app.new_chat();
            app.state = AppState::Composing;
        }
        (Tab::Chat, KeyCode::Enter) => app.open_selected_chat_session(),
        (Tab::Chat, KeyCode::Char('d') | KeyCode::Delete) => app.delete_selected_chat_session(),
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next(app.login_mode);
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev(app.login_mode);
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Button => {
                // On failure login_error is set and the overlay stays up
                if app.attempt_login().await.is_ok() && app.state == AppState::Normal {
                    app.refresh_current_tab();
                }
            }
            LoginFocus::SwitchMode => app.toggle_login_mode(),
            focus => app.login_focus = focus.next(app.login_mode),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button | LoginFocus::SwitchMode => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button | LoginFocus::SwitchMode => {}
        },
        _ => {}
    }
    Ok(false)
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.search_results.clear();
            app.status_message = None;
        }
        KeyCode::Enter => {
            if app.search_results.is_empty() {
                app.run_search();
            } else if let Some(result) = app.search_results.get(app.search_selection) {
                let id = result.id.clone();
                app.state = AppState::Normal;
                app.search_results.clear();
                app.status_message = None;
                app.open_coin(&id);
            }
        }
        KeyCode::Up => {
            app.search_selection = app.search_selection.saturating_sub(1);
        }
        KeyCode::Down => {
            if app.search_selection + 1 < app.search_results.len() {
                app.search_selection += 1;
            }
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            app.search_results.clear();
        }
        KeyCode::Char(c) => {
            if can_add_search_char(app.search_query.chars().count(), c) {
                app.search_query.push(c);
                app.search_results.clear();
            }
        }
        _ => {}
    }
}

fn handle_compose_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Enter => app.send_chat_message(),
        KeyCode::Tab => {
            if app.chat_input.is_empty() {
                if let Some(first) = app.chat_suggestions.first() {
                    app.chat_input = first.clone();
                }
            }
        }
        KeyCode::Backspace => {
            app.chat_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_chat_char(app.chat_input.chars().count(), c) {
                app.chat_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_portfolio_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.portfolio_input.clear();
            app.editing_entry = None;
            app.state = AppState::Normal;
        }
        KeyCode::Enter => app.submit_portfolio_input(),
        KeyCode::Backspace => {
            app.portfolio_input.pop();
        }
        KeyCode::Char(c) => {
            if can_add_portfolio_char(app.portfolio_input.len(), c) {
                app.portfolio_input.push(c);
            }
        }
        _ => {}
    }
}

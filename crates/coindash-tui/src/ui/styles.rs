use ratatui::style::{Color, Modifier, Style};

use coindash_core::Theme;

// Color palette
pub const PRIMARY: Color = Color::Rgb(64, 128, 192);
pub const SECONDARY: Color = Color::Rgb(96, 176, 96);
pub const ACCENT: Color = Color::Rgb(192, 160, 64);
pub const ERROR: Color = Color::Rgb(200, 72, 72);
pub const MUTED: Color = Color::Rgb(128, 128, 128);
pub const HIGHLIGHT: Color = Color::Rgb(48, 48, 64);

const DARK_BG: Color = Color::Rgb(18, 18, 26);
const LIGHT_BG: Color = Color::Rgb(244, 244, 240);
const LIGHT_HIGHLIGHT: Color = Color::Rgb(210, 220, 235);

/// Whole-screen base style. `System` leaves the terminal's own colors.
pub fn base_style(theme: Theme) -> Style {
    match theme {
        Theme::Dark => Style::default().bg(DARK_BG).fg(Color::White),
        Theme::Light => Style::default().bg(LIGHT_BG).fg(Color::Black),
        Theme::System => Style::default(),
    }
}

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style(theme: Theme) -> Style {
    let bg = match theme {
        Theme::Light => LIGHT_HIGHLIGHT,
        Theme::Dark | Theme::System => HIGHLIGHT,
    };
    Style::default().bg(bg).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default()
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SECONDARY)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

/// Green for gains, red for losses
pub fn change_style(value: f64) -> Style {
    if value >= 0.0 {
        success_style()
    } else {
        error_style()
    }
}

pub fn tab_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default()
    }
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn search_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn status_bar_style(theme: Theme) -> Style {
    match theme {
        Theme::Light => Style::default().bg(Color::Rgb(225, 225, 220)).fg(Color::Black),
        Theme::Dark | Theme::System => Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White),
    }
}

pub fn help_key_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default()
}

pub fn header_style() -> Style {
    Style::default().fg(MUTED).add_modifier(Modifier::BOLD)
}

//! Coindash TUI - a terminal dashboard for cryptocurrency markets.
//!
//! This application provides a keyboard-driven interface for browsing
//! market data, keeping a watchlist and portfolio, and chatting with the
//! Coindash assistant.

mod app;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coindash_core::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "coindash.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily rolling file since stderr belongs to the terminal UI.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=coindash_core=debug).
fn init_tracing() -> Option<WorkerGuard> {
    let log_dir = Config::log_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing();
    info!(api = %config.base_url(), "Coindash TUI starting");

    // Create app before touching the terminal so setup errors print normally
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the stored session or show the login overlay
    app.start().await;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Coindash TUI shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Windows reports releases too
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        // Keep live prices fresh on the market views
        app.poll_market();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

//! TUI (Terminal User Interface) module for the Glosspeek CLI
//!
//! The reader screen shows a document; selecting a span (mouse drag or
//! `v` visual mode) requests a translation through the coordinator and
//! renders it as a tooltip anchored to the selection. The settings screen
//! edits the persisted configuration and the pinned list.

mod app;
mod events;
mod ui;

pub use app::App;

use std::sync::Arc;
use std::time::Instant;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use glosspeek_core::{CoordinatorHandle, SettingsStore};

use events::{Event, EventHandler};

/// Context id this TUI registers with the coordinator.
const CONTEXT_ID: &str = "tui";

/// Run the TUI until the user quits.
pub async fn run(
    store: Arc<SettingsStore>,
    handle: CoordinatorHandle,
    title: String,
    text: String,
) -> anyhow::Result<()> {
    let output_rx = handle.register_context(CONTEXT_ID);
    let mut handler = EventHandler::new(output_rx);
    let mut app = App::new(title, &text, store);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &mut handler, &handle).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    handle.unregister_context(CONTEXT_ID);

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    handler: &mut EventHandler,
    handle: &CoordinatorHandle,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        let Some(event) = handler.next().await else {
            break;
        };
        match event {
            Event::Terminal(evt) => app.handle_terminal(evt, Instant::now()),
            Event::Coordinator(output) => app.handle_output(output),
            Event::Tick => app.tick(Instant::now()),
        }

        for input in app.drain_actions() {
            handle.send(CONTEXT_ID, input).await?;
        }
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

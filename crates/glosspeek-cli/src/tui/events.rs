//! Event handling for the TUI

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent};
use tokio::sync::mpsc;

use glosspeek_core::CoordinatorOutput;

/// Events that can occur in the TUI
#[derive(Debug)]
pub enum Event {
    /// Terminal event (key press, mouse, resize)
    Terminal(CrosstermEvent),
    /// Output from the coordinator
    Coordinator(CoordinatorOutput),
    /// Tick for debounce checks and UI refresh
    Tick,
}

/// Event handler that polls for terminal events and forwards coordinator
/// outputs into one stream.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    /// Kept so the channel stays open while the polling threads run
    _tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new(mut output_rx: mpsc::UnboundedReceiver<CoordinatorOutput>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Terminal polling on a dedicated thread; a tick goes out every
        // pass so debounce deadlines are checked promptly.
        let tx_terminal = tx.clone();
        std::thread::spawn(move || {
            loop {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        if tx_terminal.send(Event::Terminal(evt)).is_err() {
                            break;
                        }
                    }
                }
                if tx_terminal.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        // Coordinator output forwarding
        let tx_outputs = tx.clone();
        tokio::spawn(async move {
            while let Some(output) = output_rx.recv().await {
                if tx_outputs.send(Event::Coordinator(output)).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx: tx }
    }

    /// Get the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

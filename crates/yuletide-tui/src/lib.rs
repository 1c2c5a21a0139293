pub mod app;
pub mod log_layer;
pub mod ui;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, watch};
use yuletide_core::tui_types::{SessionSnapshot, UiCommand};
use yuletide_core::PersonaConfig;

pub use app::App;
pub use log_layer::TuiLogLayer;

/// Run the TUI event loop. Blocks until the user quits.
pub async fn run(
    mut state_rx: watch::Receiver<SessionSnapshot>,
    personas: Vec<PersonaConfig>,
    default_persona: &str,
    cmd_tx: mpsc::UnboundedSender<UiCommand>,
    log_buffer: Arc<Mutex<VecDeque<String>>>,
) -> std::io::Result<()> {
    let mut app = App::new(personas, default_persona, Arc::clone(&log_buffer));
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, &mut app, &mut state_rx, &cmd_tx).await;
    ratatui::restore();
    result
}

async fn run_loop(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    state_rx: &mut watch::Receiver<SessionSnapshot>,
    cmd_tx: &mpsc::UnboundedSender<UiCommand>,
) -> std::io::Result<()> {
    loop {
        // Pick up the latest session snapshot
        if state_rx.has_changed().unwrap_or(false) {
            app.update_state(state_rx.borrow_and_update().clone());
        }

        terminal.draw(|frame| ui::draw(frame, app))?;

        // Short poll so streamed transcript text keeps redrawing
        if event::poll(std::time::Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key(key) {
                        app::AppAction::Quit => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break;
                        }
                        app::AppAction::Command(cmd) => {
                            let _ = cmd_tx.send(cmd);
                        }
                        app::AppAction::None => {}
                    }
                }
            }
        }
    }

    Ok(())
}

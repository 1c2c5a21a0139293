use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossterm::event::{KeyCode, KeyEvent};
use yuletide_core::tui_types::{SessionSnapshot, UiCommand};
use yuletide_core::PersonaConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Live,
    Personas,
    Logs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    None,
    Quit,
    Command(UiCommand),
}

pub struct App {
    pub tab: Tab,
    pub state: SessionSnapshot,
    pub personas: Vec<PersonaConfig>,
    pub selected_persona: usize,
    pub should_quit: bool,
    pub logs: Arc<Mutex<VecDeque<String>>>,
    pub log_scroll: usize,
    pub log_auto_scroll: bool,
}

impl App {
    pub fn new(
        personas: Vec<PersonaConfig>,
        default_persona: &str,
        logs: Arc<Mutex<VecDeque<String>>>,
    ) -> Self {
        let selected_persona = personas
            .iter()
            .position(|p| p.id == default_persona)
            .unwrap_or(0);
        Self {
            tab: Tab::Live,
            state: SessionSnapshot::default(),
            personas,
            selected_persona,
            should_quit: false,
            logs,
            log_scroll: 0,
            log_auto_scroll: true,
        }
    }

    pub fn update_state(&mut self, new_state: SessionSnapshot) {
        self.state = new_state;
    }

    pub fn selected(&self) -> Option<&PersonaConfig> {
        self.personas.get(self.selected_persona)
    }

    /// Persona of the running session, falling back to the selection.
    pub fn session_persona(&self) -> Option<&PersonaConfig> {
        self.state
            .persona
            .as_deref()
            .and_then(|name| self.personas.iter().find(|p| p.name == name))
            .or_else(|| self.selected())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        // Global keys
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return AppAction::Quit;
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Live;
                return AppAction::None;
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Personas;
                return AppAction::None;
            }
            KeyCode::Char('3') => {
                self.tab = Tab::Logs;
                return AppAction::None;
            }
            KeyCode::Char(' ') | KeyCode::Enter => return self.toggle_session(),
            KeyCode::Char('c') => return AppAction::Command(UiCommand::ClearTranscript),
            KeyCode::Char('m') => {
                return AppAction::Command(UiCommand::SetMicMuted(!self.state.mic_muted))
            }
            _ => {}
        }

        // Tab-specific keys
        match self.tab {
            Tab::Personas => self.handle_personas_key(key),
            Tab::Logs => self.handle_logs_key(key),
            Tab::Live => AppAction::None,
        }
    }

    fn toggle_session(&self) -> AppAction {
        if self.state.status.is_engaged() {
            return AppAction::Command(UiCommand::StopSession);
        }
        match self.selected() {
            Some(persona) => AppAction::Command(UiCommand::StartSession {
                persona_id: persona.id.clone(),
            }),
            None => AppAction::None,
        }
    }

    fn handle_personas_key(&mut self, key: KeyEvent) -> AppAction {
        // The persona is fixed for the lifetime of a session
        if self.personas.is_empty() || self.state.status.is_engaged() {
            return AppAction::None;
        }

        match key.code {
            KeyCode::Up => {
                if self.selected_persona > 0 {
                    self.selected_persona -= 1;
                }
                AppAction::None
            }
            KeyCode::Down => {
                if self.selected_persona + 1 < self.personas.len() {
                    self.selected_persona += 1;
                }
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Up => {
                self.log_scroll = self.log_scroll.saturating_add(1);
                self.log_auto_scroll = false;
                AppAction::None
            }
            KeyCode::Down => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
                AppAction::None
            }
            KeyCode::Char('G') => {
                self.log_scroll = 0;
                self.log_auto_scroll = true;
                AppAction::None
            }
            _ => AppAction::None,
        }
    }
}

pub mod config;
pub mod error;
pub mod persona;
pub mod tui_types;
pub mod types;

pub use config::{AppConfig, AudioConfig, LiveConfig};
pub use error::{AudioError, ConfigError, LiveError, SessionError};
pub use persona::PersonaConfig;
pub use tui_types::{SessionSnapshot, SessionStatus, UiCommand};
pub use types::{AudioChunk, Role, TranscriptEntry};

use crate::types::TranscriptEntry;

/// Lifecycle state of the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Active,
    Error,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "IDLE",
            SessionStatus::Connecting => "CONNECTING",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Error => "ERROR",
        }
    }

    /// True while a session holds devices or a connection.
    pub fn is_engaged(&self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Active)
    }
}

/// Session state broadcast to the TUI via watch channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Display name of the persona of the current or last session.
    pub persona: Option<String>,
    pub error: Option<String>,
    /// Non-fault reason the last session ended (e.g. remote close).
    pub notice: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub scheduled_buffers: usize,
    pub mic_muted: bool,
}

/// Commands sent from TUI → main via mpsc channel.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    StartSession { persona_id: String },
    StopSession,
    ClearTranscript,
    SetMicMuted(bool),
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_snapshot_default() {
        let state = SessionSnapshot::default();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.persona.is_none());
        assert!(state.error.is_none());
        assert!(state.notice.is_none());
        assert!(state.transcript.is_empty());
        assert_eq!(state.scheduled_buffers, 0);
        assert!(!state.mic_muted);
    }

    #[test]
    fn test_status_engaged() {
        assert!(!SessionStatus::Idle.is_engaged());
        assert!(SessionStatus::Connecting.is_engaged());
        assert!(SessionStatus::Active.is_engaged());
        assert!(!SessionStatus::Error.is_engaged());
    }

    #[test]
    fn test_ui_command_clone_eq() {
        let cmd = UiCommand::StartSession {
            persona_id: "agent_santa".to_string(),
        };
        assert_eq!(cmd.clone(), cmd);
    }

    #[test]
    fn test_snapshot_is_clone() {
        let state = SessionSnapshot {
            status: SessionStatus::Active,
            persona: Some("Agent Santa".to_string()),
            transcript: vec![TranscriptEntry::new(Role::Model, "Ho ho")],
            scheduled_buffers: 3,
            ..Default::default()
        };
        assert_eq!(state.clone(), state);
    }
}

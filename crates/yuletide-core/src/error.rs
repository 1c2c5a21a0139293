use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("failed to start stream: {0}")]
    StreamPlay(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("failed to decode audio payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("no API key configured for the live endpoint")]
    MissingApiKey,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection timed out after {0}s")]
    Timeout(u64),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    Closed,

    #[error("connector not found: {0}")]
    ConnectorNotFound(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,

    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("could not connect to the live endpoint: {0}")]
    ConnectionFailed(String),

    #[error("connection error: {0}")]
    Transport(String),

    #[error("session closed by remote endpoint: {0}")]
    RemoteClosed(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("session start cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_messages_are_user_facing() {
        let err = SessionError::PermissionDenied("no default input device".into());
        assert_eq!(
            err.to_string(),
            "microphone access denied: no default input device"
        );
        let err = SessionError::RemoteClosed("deadline exceeded".into());
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[test]
    fn test_audio_error_converts_into_session_error() {
        let err: SessionError = AudioError::StreamBuild("busy".into()).into();
        assert_eq!(err.to_string(), "failed to build stream: busy");
    }

    #[test]
    fn test_live_timeout_message() {
        assert_eq!(
            LiveError::Timeout(10).to_string(),
            "connection timed out after 10s"
        );
    }
}

//! JSON messages of the Gemini Live `BidiGenerateContent` WebSocket.
//!
//! Only the subset the voice session uses is modelled. Unknown fields in
//! server messages are ignored.

use crate::connector::{LiveEvent, SessionSetup};
use serde::{Deserialize, Serialize};
use yuletide_core::{LiveError, Role};

// ── Client → server ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    pub fn audio(mime_type: &str, data: String) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: mime_type.to_string(),
                data,
            }],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<TranscriptionConfig>,
}

impl From<&SessionSetup> for Setup {
    fn from(setup: &SessionSetup) -> Self {
        let model = if setup.model.starts_with("models/") {
            setup.model.clone()
        } else {
            format!("models/{}", setup.model)
        };
        Self {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![setup.modality],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: setup.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(setup.system_instruction.clone()),
                    inline_data: None,
                }],
            },
            input_audio_transcription: setup.transcribe_input.then(TranscriptionConfig::default),
            output_audio_transcription: setup
                .transcribe_output
                .then(TranscriptionConfig::default),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Requests transcription; serialized as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptionConfig {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

// ── Shared ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

// ── Server → client ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, LiveError> {
    serde_json::from_str(text).map_err(|e| LiveError::Protocol(e.to_string()))
}

impl ServerMessage {
    /// Flatten into session events, in the order the session must apply them:
    /// audio, model transcript, user transcript, turn complete, interrupted.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(LiveEvent::SetupComplete);
        }

        if let Some(content) = self.server_content {
            let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
            for part in parts {
                if let Some(blob) = part.inline_data {
                    if blob.mime_type.is_empty() || blob.mime_type.starts_with("audio/") {
                        events.push(LiveEvent::Audio { data: blob.data });
                    }
                }
            }
            if let Some(t) = content.output_transcription {
                events.push(LiveEvent::Transcript {
                    role: Role::Model,
                    text: t.text,
                });
            }
            if let Some(t) = content.input_transcription {
                events.push(LiveEvent::Transcript {
                    role: Role::User,
                    text: t.text,
                });
            }
            if content.turn_complete {
                events.push(LiveEvent::TurnComplete);
            }
            if content.interrupted {
                events.push(LiveEvent::Interrupted);
            }
        }

        if let Some(go_away) = self.go_away {
            events.push(LiveEvent::GoAway {
                time_left: go_away.time_left,
            });
        }

        events
    }
}

/// Sample rate from a `audio/pcm;rate=NNNN` content type.
pub fn mime_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> SessionSetup {
        SessionSetup {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice_name: "Puck".to_string(),
            system_instruction: "You are Agent Santa.".to_string(),
            modality: Modality::Audio,
            transcribe_input: true,
            transcribe_output: true,
        }
    }

    #[test]
    fn test_setup_message_shape() {
        let msg = ClientMessage::Setup(Setup::from(&setup()));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/gemini-2.5-flash-native-audio-preview-09-2025",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": {
                                "prebuiltVoiceConfig": { "voiceName": "Puck" }
                            }
                        }
                    },
                    "systemInstruction": { "parts": [{ "text": "You are Agent Santa." }] },
                    "inputAudioTranscription": {},
                    "outputAudioTranscription": {}
                }
            })
        );
    }

    #[test]
    fn test_setup_keeps_models_prefix_and_skips_transcription() {
        let mut s = setup();
        s.model = "models/custom".to_string();
        s.transcribe_input = false;
        s.transcribe_output = false;
        let value = serde_json::to_value(ClientMessage::Setup(Setup::from(&s))).unwrap();
        assert_eq!(value["setup"]["model"], "models/custom");
        assert!(value["setup"].get("inputAudioTranscription").is_none());
        assert!(value["setup"].get("outputAudioTranscription").is_none());
    }

    #[test]
    fn test_realtime_input_shape() {
        let msg = ClientMessage::audio("audio/pcm;rate=16000", "AEA=".to_string());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": "AEA=" }]
                }
            })
        );
    }

    #[test]
    fn test_setup_complete_event() {
        let msg = parse_server_message(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![LiveEvent::SetupComplete]);
    }

    #[test]
    fn test_server_content_event_order() {
        let text = r#"{
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } },
                    { "text": "thinking" },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQA=" } }
                ] },
                "outputTranscription": { "text": "Hello " },
                "inputTranscription": { "text": "Hi" },
                "turnComplete": true,
                "interrupted": true
            }
        }"#;
        let events = parse_server_message(text).unwrap().into_events();
        assert_eq!(
            events,
            vec![
                LiveEvent::Audio { data: "AAA=".to_string() },
                LiveEvent::Audio { data: "AQA=".to_string() },
                LiveEvent::Transcript { role: Role::Model, text: "Hello ".to_string() },
                LiveEvent::Transcript { role: Role::User, text: "Hi".to_string() },
                LiveEvent::TurnComplete,
                LiveEvent::Interrupted,
            ]
        );
    }

    #[test]
    fn test_non_audio_inline_data_ignored() {
        let text = r#"{"serverContent": {"modelTurn": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": "xyz"}}
        ]}}}"#;
        assert!(parse_server_message(text).unwrap().into_events().is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let text = r#"{"usageMetadata": {"totalTokenCount": 12}, "serverContent": {"generationComplete": true}}"#;
        assert!(parse_server_message(text).unwrap().into_events().is_empty());
    }

    #[test]
    fn test_go_away_event() {
        let text = r#"{"goAway": {"timeLeft": "10s"}}"#;
        assert_eq!(
            parse_server_message(text).unwrap().into_events(),
            vec![LiveEvent::GoAway { time_left: Some("10s".to_string()) }]
        );
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let err = parse_server_message("{not json").unwrap_err();
        assert!(matches!(err, LiveError::Protocol(_)));
    }

    #[test]
    fn test_mime_rate() {
        assert_eq!(mime_rate("audio/pcm;rate=16000"), Some(16000));
        assert_eq!(mime_rate("audio/pcm; rate=24000"), Some(24000));
        assert_eq!(mime_rate("audio/pcm"), None);
        assert_eq!(mime_rate("audio/pcm;rate=abc"), None);
    }
}

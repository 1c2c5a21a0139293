use crate::connector::{LiveConnection, LiveConnector, LiveEvent, SessionSetup};
use crate::protocol::{mime_rate, ClientMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;
use yuletide_audio::codec::{decode_chunk, encode_chunk, resample};
use yuletide_audio::{PLAYBACK_SAMPLE_RATE, SEND_SAMPLE_RATE};
use yuletide_core::{LiveError, Role};

/// Offline connector that plays the microphone back at the playback rate.
///
/// Acknowledges setup immediately, answers every audio chunk with the same
/// audio and a model transcript fragment, and closes a turn every
/// `turn_chunks` chunks. Useful for checking the audio path without a key.
pub struct EchoConnector {
    turn_chunks: usize,
}

impl EchoConnector {
    pub fn new(turn_chunks: usize) -> Self {
        Self {
            turn_chunks: turn_chunks.max(1),
        }
    }
}

impl Default for EchoConnector {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl LiveConnector for EchoConnector {
    fn name(&self) -> &str {
        "echo"
    }

    async fn connect(&self, setup: SessionSetup) -> Result<LiveConnection, LiveError> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LiveEvent>();
        let turn_chunks = self.turn_chunks;

        tracing::info!(voice = %setup.voice_name, "echo session opened");

        let task = tokio::spawn(async move {
            if event_tx.send(LiveEvent::SetupComplete).is_err() {
                return;
            }
            let mut answered = 0usize;
            while let Some(message) = out_rx.recv().await {
                let ClientMessage::RealtimeInput(input) = message else {
                    continue;
                };
                for blob in input.media_chunks {
                    let samples = match decode_chunk(&blob.data) {
                        Ok(samples) => samples,
                        Err(e) => {
                            tracing::warn!("echo: {}", e);
                            continue;
                        }
                    };
                    let rate = mime_rate(&blob.mime_type).unwrap_or(SEND_SAMPLE_RATE);
                    let echoed = resample(&samples, rate, PLAYBACK_SAMPLE_RATE);
                    answered += 1;

                    let mut events = vec![
                        LiveEvent::Audio {
                            data: encode_chunk(&echoed),
                        },
                        LiveEvent::Transcript {
                            role: Role::Model,
                            text: format!("echo {} ", answered),
                        },
                    ];
                    if answered % turn_chunks == 0 {
                        events.push(LiveEvent::TurnComplete);
                    }
                    for event in events {
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(LiveConnection::new(out_tx, event_rx).with_task(task))
    }
}

use crate::connector::{LiveConnection, LiveConnector, LiveEvent, SessionSetup};
use crate::protocol::{parse_server_message, ClientMessage, Setup};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use yuletide_core::{LiveConfig, LiveError};

/// Gemini Live over a WebSocket.
///
/// The API key travels as the `key` query parameter and never appears in logs.
pub struct GeminiConnector {
    endpoint: String,
    api_key: String,
    connect_timeout: Duration,
}

impl GeminiConnector {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.max(1)),
        }
    }

    fn url(&self) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, sep, self.api_key)
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn connect(&self, setup: SessionSetup) -> Result<LiveConnection, LiveError> {
        if self.api_key.trim().is_empty() {
            return Err(LiveError::MissingApiKey);
        }

        tracing::info!(endpoint = %self.endpoint, model = %setup.model, "connecting to live endpoint");

        let url = self.url();
        let (ws_stream, _) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| LiveError::Timeout(self.connect_timeout.as_secs()))?
                .map_err(|e| LiveError::ConnectionFailed(redact(&e.to_string(), &self.api_key)))?;

        let (mut write, mut read) = ws_stream.split();

        let setup_text = serde_json::to_string(&ClientMessage::Setup(Setup::from(&setup)))
            .map_err(|e| LiveError::Protocol(e.to_string()))?;
        write
            .send(Message::Text(setup_text))
            .await
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;
        tracing::debug!(voice = %setup.voice_name, "setup sent");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LiveEvent>();

        // Writer: ends with a close frame once the connection handle is dropped
        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("failed to encode outbound message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    let _ = writer_events.send(LiveEvent::TransportError {
                        message: e.to_string(),
                    });
                    return;
                }
            }
            let _ = write.close().await;
            tracing::debug!("live writer closed");
        });

        let reader = tokio::spawn(async move {
            loop {
                let keep_going = match read.next().await {
                    Some(Ok(Message::Text(text))) => dispatch(&text, &event_tx),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => dispatch(text, &event_tx),
                        Err(_) => {
                            tracing::warn!(len = bytes.len(), "non-UTF-8 binary frame ignored");
                            true
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = close_reason(frame);
                        tracing::info!(%reason, "live endpoint closed the connection");
                        let _ = event_tx.send(LiveEvent::Closed { reason });
                        false
                    }
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        tracing::warn!("live websocket error: {}", e);
                        let _ = event_tx.send(LiveEvent::TransportError {
                            message: e.to_string(),
                        });
                        false
                    }
                    None => {
                        let _ = event_tx.send(LiveEvent::Closed {
                            reason: "connection ended".to_string(),
                        });
                        false
                    }
                };
                if !keep_going {
                    break;
                }
            }
        });

        Ok(LiveConnection::new(out_tx, event_rx).with_task(reader))
    }
}

/// Forward one server message. Returns false once nobody is listening.
fn dispatch(text: &str, events: &mpsc::UnboundedSender<LiveEvent>) -> bool {
    match parse_server_message(text) {
        Ok(message) => message
            .into_events()
            .into_iter()
            .all(|event| events.send(event).is_ok()),
        Err(e) => {
            tracing::warn!(
                "invalid message from live endpoint: {} ({})",
                e,
                text.chars().take(100).collect::<String>()
            );
            !events.is_closed()
        }
    }
}

fn close_reason(frame: Option<CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => {
            format!("{} ({})", frame.reason, u16::from(frame.code))
        }
        Some(frame) => format!("close code {}", u16::from(frame.code)),
        None => "closed without a reason".to_string(),
    }
}

fn redact(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        message.to_string()
    } else {
        message.replace(secret, "***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    fn config(api_key: &str) -> LiveConfig {
        LiveConfig {
            api_key: api_key.to_string(),
            ..LiveConfig::default()
        }
    }

    #[test]
    fn test_url_appends_key() {
        let connector = GeminiConnector::new(&config("abc"));
        assert!(connector.url().ends_with("BidiGenerateContent?key=abc"));

        let mut cfg = config("abc");
        cfg.endpoint = "ws://localhost/ws?alt=json".to_string();
        assert_eq!(
            GeminiConnector::new(&cfg).url(),
            "ws://localhost/ws?alt=json&key=abc"
        );
    }

    #[test]
    fn test_redact_hides_key() {
        assert_eq!(redact("bad url ...?key=s3cret", "s3cret"), "bad url ...?key=***");
        assert_eq!(redact("no key", ""), "no key");
    }

    #[test]
    fn test_close_reason_formats() {
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: "quota exceeded".into(),
        };
        assert_eq!(close_reason(Some(frame)), "quota exceeded (1008)");
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        assert_eq!(close_reason(Some(frame)), "close code 1000");
        assert_eq!(close_reason(None), "closed without a reason");
    }

    #[test]
    fn test_dispatch_skips_malformed_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(dispatch("not json", &tx));
        assert!(rx.try_recv().is_err());
        assert!(dispatch(r#"{"setupComplete": {}}"#, &tx));
        assert_eq!(rx.try_recv().unwrap(), LiveEvent::SetupComplete);
    }

    #[test]
    fn test_dispatch_stops_when_receiver_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(!dispatch(r#"{"setupComplete": {}}"#, &tx));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let connector = GeminiConnector::new(&config("  "));
        let setup = SessionSetup::for_persona(
            "m",
            &yuletide_core::persona::builtin_personas()[0],
        );
        let result = connector.connect(setup).await;
        assert!(matches!(result, Err(LiveError::MissingApiKey)));
    }
}

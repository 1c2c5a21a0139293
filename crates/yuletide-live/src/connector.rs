use crate::protocol::{ClientMessage, Modality};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use yuletide_core::{LiveError, PersonaConfig, Role};

/// Something the remote model did, already decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Setup acknowledged; audio may flow.
    SetupComplete,
    /// Base64 PCM16 mono audio at 24 kHz.
    Audio { data: String },
    Transcript { role: Role, text: String },
    TurnComplete,
    /// The user barged in; queued model audio must be dropped.
    Interrupted,
    /// The server will close the connection soon.
    GoAway { time_left: Option<String> },
    Closed { reason: String },
    TransportError { message: String },
}

/// Parameters sent once when a connection opens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub model: String,
    pub voice_name: String,
    pub system_instruction: String,
    pub modality: Modality,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
}

impl SessionSetup {
    /// Audio responses in the persona's voice, with both sides transcribed.
    pub fn for_persona(model: &str, persona: &PersonaConfig) -> Self {
        Self {
            model: model.to_string(),
            voice_name: persona.voice_name.clone(),
            system_instruction: persona.system_instruction.clone(),
            modality: Modality::Audio,
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}

/// A realtime model endpoint.
///
/// Implementations are registered via [`ConnectorRegistry`](crate::ConnectorRegistry).
/// `connect` returns once the transport is open and the setup message has
/// been sent; the acknowledgment arrives later as [`LiveEvent::SetupComplete`].
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Returns the connector's registry name (e.g. `"gemini"`, `"echo"`).
    fn name(&self) -> &str;
    async fn connect(&self, setup: SessionSetup) -> Result<LiveConnection, LiveError>;
}

/// An open bidirectional session.
///
/// Outbound messages are queued to a writer task. Dropping the connection
/// closes the outbound queue and aborts the attached tasks.
pub struct LiveConnection {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: Option<mpsc::UnboundedReceiver<LiveEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveConnection {
    pub fn new(
        outbound: mpsc::UnboundedSender<ClientMessage>,
        events: mpsc::UnboundedReceiver<LiveEvent>,
    ) -> Self {
        Self {
            outbound,
            events: Some(events),
            tasks: Vec::new(),
        }
    }

    /// Attach a task that is aborted when the connection is dropped.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }

    /// The inbound event stream. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LiveEvent>> {
        self.events.take()
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), LiveError> {
        self.outbound.send(message).map_err(|_| LiveError::Closed)
    }

    pub fn send_audio(&self, mime_type: &str, data: String) -> Result<(), LiveError> {
        self.send(ClientMessage::audio(mime_type, data))
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

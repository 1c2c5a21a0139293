use crate::scheduler::PlaybackScheduler;
use crate::transcript::TranscriptLog;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use yuletide_audio::codec::{decode_chunk, encode_chunk, resample};
use yuletide_audio::{
    AudioBackend, BufferId, CaptureEvent, CaptureHandle, PlaybackTimeline, StreamGuard,
    PLAYBACK_SAMPLE_RATE, SEND_MIME_TYPE, SEND_SAMPLE_RATE,
};
use yuletide_core::{
    AppConfig, AudioChunk, AudioError, LiveError, PersonaConfig, SessionError, SessionSnapshot,
    SessionStatus,
};
use yuletide_live::{LiveConnection, LiveConnector, LiveEvent, SessionSetup};

type StartReply = oneshot::Sender<Result<(), SessionError>>;

/// Per-adapter settings taken from the app config.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub model: String,
    pub capture_block_size: usize,
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.live.model.clone(),
            capture_block_size: config.audio.capture_block_size,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Requests handled by the adapter task.
pub enum SessionCommand {
    Start {
        persona: PersonaConfig,
        reply: StartReply,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    ClearTranscript,
    SetMicMuted(bool),
    Shutdown,
}

// ── SessionHandle ─────────────────────────────────────────────

/// Cloneable front door to a running [`SessionAdapter`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Start a session. Resolves once the endpoint acknowledges the setup,
    /// or with the reason the attempt failed or was cancelled.
    pub async fn start(&self, persona: PersonaConfig) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Start { persona, reply })
            .map_err(|_| SessionError::Cancelled)?;
        response.await.unwrap_or(Err(SessionError::Cancelled))
    }

    /// Stop the current session, if any. Returns after teardown finished.
    pub async fn stop(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(SessionCommand::Stop { reply }).is_ok() {
            let _ = done.await;
        }
    }

    pub fn clear_transcript(&self) {
        let _ = self.commands.send(SessionCommand::ClearTranscript);
    }

    pub fn set_mic_muted(&self, muted: bool) {
        let _ = self.commands.send(SessionCommand::SetMicMuted(muted));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

// ── Session state ─────────────────────────────────────────────

enum Link {
    Connecting {
        result: oneshot::Receiver<Result<LiveConnection, LiveError>>,
        task: JoinHandle<()>,
    },
    Open {
        connection: LiveConnection,
        events: mpsc::UnboundedReceiver<LiveEvent>,
        acknowledged: bool,
    },
}

enum LinkUpdate {
    Connected(Result<LiveConnection, LiveError>),
    Event(Option<LiveEvent>),
}

impl Link {
    async fn next(&mut self) -> LinkUpdate {
        match self {
            Link::Connecting { result, .. } => LinkUpdate::Connected(result.await.unwrap_or_else(
                |_| {
                    Err(LiveError::ConnectionFailed(
                        "connection attempt aborted".to_string(),
                    ))
                },
            )),
            Link::Open { events, .. } => LinkUpdate::Event(events.recv().await),
        }
    }
}

struct ActiveSession {
    persona: PersonaConfig,
    capture: StreamGuard,
    playback: StreamGuard,
    mic: CaptureHandle,
    timeline: PlaybackTimeline,
    capture_rx: Option<mpsc::UnboundedReceiver<CaptureEvent>>,
    finished_rx: mpsc::UnboundedReceiver<BufferId>,
    scheduler: PlaybackScheduler,
    pending_start: Option<StartReply>,
    link: Link,
}

impl ActiveSession {
    fn is_acknowledged(&self) -> bool {
        matches!(
            self.link,
            Link::Open {
                acknowledged: true,
                ..
            }
        )
    }

    fn acknowledge(&mut self) {
        if let Link::Open { acknowledged, .. } = &mut self.link {
            *acknowledged = true;
        }
    }
}

enum Wake {
    Command(Option<SessionCommand>),
    Link(LinkUpdate),
    Capture(Option<CaptureEvent>),
    Finished(Option<BufferId>),
}

// ── SessionAdapter ────────────────────────────────────────────

/// Owns the lifecycle of one streaming voice session at a time.
///
/// Runs as a single task and is the only writer of the session state. The
/// UI observes it through a watch channel and drives it with commands.
pub struct SessionAdapter {
    connector: Arc<dyn LiveConnector>,
    backend: Arc<dyn AudioBackend>,
    options: SessionOptions,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state_tx: watch::Sender<SessionSnapshot>,
    transcript: TranscriptLog,
    status: SessionStatus,
    persona: Option<String>,
    error: Option<String>,
    notice: Option<String>,
    mic_muted: bool,
    session: Option<ActiveSession>,
}

impl SessionAdapter {
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        backend: Arc<dyn AudioBackend>,
        options: SessionOptions,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::default());
        let adapter = Self {
            connector,
            backend,
            options,
            commands: cmd_rx,
            state_tx,
            transcript: TranscriptLog::new(),
            status: SessionStatus::Idle,
            persona: None,
            error: None,
            notice: None,
            mic_muted: false,
            session: None,
        };
        let handle = SessionHandle {
            commands: cmd_tx,
            state: state_rx,
        };
        (adapter, handle)
    }

    pub fn spawn(
        connector: Arc<dyn LiveConnector>,
        backend: Arc<dyn AudioBackend>,
        options: SessionOptions,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (adapter, handle) = Self::new(connector, backend, options);
        (handle, tokio::spawn(adapter.run()))
    }

    pub async fn run(mut self) {
        tracing::info!(
            connector = self.connector.name(),
            backend = self.backend.name(),
            "session adapter running"
        );

        loop {
            match self.next_wake().await {
                Wake::Command(None) | Wake::Command(Some(SessionCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle_command(command).await,
                Wake::Link(LinkUpdate::Connected(result)) => self.handle_connected(result).await,
                Wake::Link(LinkUpdate::Event(event)) => self.handle_remote(event).await,
                Wake::Capture(event) => self.handle_capture(event).await,
                Wake::Finished(id) => self.handle_finished(id),
            }
        }

        self.stop().await;
        tracing::info!("session adapter stopped");
    }

    async fn next_wake(&mut self) -> Wake {
        let Some(session) = self.session.as_mut() else {
            return Wake::Command(self.commands.recv().await);
        };
        tokio::select! {
            biased;
            command = self.commands.recv() => Wake::Command(command),
            update = session.link.next() => Wake::Link(update),
            event = recv_or_pending(&mut session.capture_rx) => Wake::Capture(event),
            id = session.finished_rx.recv() => Wake::Finished(id),
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start { persona, reply } => {
                if self.session.is_some() {
                    tracing::warn!(persona = %persona.id, "start ignored: a session is already active");
                    let _ = reply.send(Err(SessionError::AlreadyActive));
                    return;
                }
                self.begin(persona, reply).await;
            }
            SessionCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            SessionCommand::ClearTranscript => {
                self.transcript.clear();
                self.publish();
            }
            SessionCommand::SetMicMuted(muted) => {
                self.mic_muted = muted;
                if let Some(session) = &self.session {
                    session.mic.set_enabled(!muted);
                }
                tracing::info!(muted, "microphone mute changed");
                self.publish();
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn begin(&mut self, persona: PersonaConfig, reply: StartReply) {
        tracing::info!(persona = %persona.id, voice = %persona.voice_name, "starting session");
        self.status = SessionStatus::Connecting;
        self.persona = Some(persona.name.clone());
        self.error = None;
        self.notice = None;
        self.publish();

        // Speaker first, then microphone. Either failure releases what opened.
        let (timeline, finished_rx) = PlaybackTimeline::new(PLAYBACK_SAMPLE_RATE);
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let backend = Arc::clone(&self.backend);
        let block_size = self.options.capture_block_size;
        let output_timeline = timeline.clone();
        let opened = tokio::task::spawn_blocking(move || {
            let playback = backend
                .open_playback(output_timeline)
                .map_err(SessionError::Audio)?;
            let (capture, mic) = backend
                .open_capture(block_size, capture_tx)
                .map_err(|e| SessionError::PermissionDenied(e.to_string()))?;
            Ok::<_, SessionError>((playback, capture, mic))
        })
        .await;

        let (playback, capture, mic) = match opened {
            Ok(Ok(devices)) => devices,
            Ok(Err(e)) => {
                self.surface_failure(e, Some(reply));
                return;
            }
            Err(e) => {
                self.surface_failure(
                    SessionError::Audio(AudioError::StreamBuild(e.to_string())),
                    Some(reply),
                );
                return;
            }
        };
        mic.set_enabled(!self.mic_muted);
        tracing::debug!(input_rate = mic.sample_rate(), "audio devices open");

        let connector = Arc::clone(&self.connector);
        let setup = SessionSetup::for_persona(&self.options.model, &persona);
        let (result_tx, result_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = result_tx.send(connector.connect(setup).await);
        });

        self.session = Some(ActiveSession {
            persona,
            capture,
            playback,
            mic,
            timeline,
            capture_rx: Some(capture_rx),
            finished_rx,
            scheduler: PlaybackScheduler::new(),
            pending_start: Some(reply),
            link: Link::Connecting {
                result: result_rx,
                task,
            },
        });
    }

    async fn handle_connected(&mut self, result: Result<LiveConnection, LiveError>) {
        match result {
            Ok(mut connection) => {
                let Some(events) = connection.take_events() else {
                    self.fail(SessionError::ConnectionFailed(
                        "connection has no event stream".to_string(),
                    ))
                    .await;
                    return;
                };
                tracing::info!(
                    connector = self.connector.name(),
                    "connection open, waiting for setup acknowledgment"
                );
                if let Some(session) = self.session.as_mut() {
                    session.link = Link::Open {
                        connection,
                        events,
                        acknowledged: false,
                    };
                }
            }
            Err(e) => self.fail(SessionError::ConnectionFailed(e.to_string())).await,
        }
    }

    async fn handle_remote(&mut self, event: Option<LiveEvent>) {
        let Some(event) = event else {
            self.remote_closed("connection ended".to_string()).await;
            return;
        };
        match event {
            LiveEvent::SetupComplete => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                session.acknowledge();
                let reply = session.pending_start.take();
                tracing::info!(persona = %session.persona.id, "session active");
                self.status = SessionStatus::Active;
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
            LiveEvent::Audio { data } => self.play(&data),
            LiveEvent::Transcript { role, text } => {
                if self.transcript.append_fragment(role, &text) {
                    self.publish();
                }
            }
            LiveEvent::TurnComplete => {
                self.transcript.complete_turn();
                self.publish();
            }
            LiveEvent::Interrupted => self.interrupt(),
            LiveEvent::GoAway { time_left } => {
                tracing::warn!(?time_left, "endpoint announced it will close the session");
                self.notice = Some(match time_left {
                    Some(t) => format!("endpoint closing in {t}"),
                    None => "endpoint closing soon".to_string(),
                });
                self.publish();
            }
            LiveEvent::Closed { reason } => self.remote_closed(reason).await,
            LiveEvent::TransportError { message } => {
                self.fail(SessionError::Transport(message)).await
            }
        }
    }

    fn play(&mut self, data: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let samples = match decode_chunk(data) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!("skipping inbound audio: {}", e);
                return;
            }
        };
        let chunk = AudioChunk {
            samples,
            sample_rate: PLAYBACK_SAMPLE_RATE,
            channels: 1,
        };
        let duration = chunk.duration_secs();
        let timeline = &session.timeline;
        let Some(slot) = session.scheduler.schedule(duration, |id, not_before| {
            timeline.schedule(id, chunk.samples, not_before)
        }) else {
            tracing::debug!("playback closed, dropping inbound audio");
            return;
        };
        tracing::trace!(
            id = slot.id,
            start = slot.start,
            duration,
            marker = session.scheduler.next_start(),
            "scheduled playback"
        );
        self.publish();
    }

    fn interrupt(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let stopped = session.scheduler.interrupt();
        for id in &stopped {
            session.timeline.stop(*id);
        }
        tracing::debug!(stopped = stopped.len(), "playback interrupted");
        self.publish();
    }

    async fn handle_capture(&mut self, event: Option<CaptureEvent>) {
        match event {
            Some(CaptureEvent::Block(chunk)) => self.send_block(chunk),
            Some(CaptureEvent::Failed(message)) => {
                self.fail(SessionError::Audio(AudioError::StreamError(message)))
                    .await
            }
            None => {
                tracing::warn!("microphone stream ended");
                if let Some(session) = self.session.as_mut() {
                    session.capture_rx = None;
                }
            }
        }
    }

    fn send_block(&self, chunk: AudioChunk) {
        if self.mic_muted {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Link::Open {
            connection,
            acknowledged: true,
            ..
        } = &session.link
        else {
            tracing::trace!("dropping block captured before acknowledgment");
            return;
        };
        let resampled = resample(&chunk.samples, chunk.sample_rate, SEND_SAMPLE_RATE);
        if resampled.is_empty() {
            return;
        }
        if let Err(e) = connection.send_audio(SEND_MIME_TYPE, encode_chunk(&resampled)) {
            tracing::debug!("outbound audio dropped: {}", e);
        }
    }

    fn handle_finished(&mut self, id: Option<BufferId>) {
        let Some(id) = id else {
            return;
        };
        let changed = self
            .session
            .as_mut()
            .map(|session| session.scheduler.finished(id))
            .unwrap_or(false);
        if changed {
            self.publish();
        }
    }

    async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            tracing::debug!("stop requested with no active session");
            return;
        };
        tracing::info!(persona = %session.persona.id, "stopping session");
        if let Some(reply) = teardown(session).await {
            let _ = reply.send(Err(SessionError::Cancelled));
        }
        self.status = SessionStatus::Idle;
        self.error = None;
        self.notice = None;
        self.publish();
    }

    async fn remote_closed(&mut self, reason: String) {
        let acknowledged = self
            .session
            .as_ref()
            .map(ActiveSession::is_acknowledged)
            .unwrap_or(false);
        if !acknowledged {
            self.fail(SessionError::ConnectionFailed(reason)).await;
            return;
        }
        if let Some(session) = self.session.take() {
            teardown(session).await;
        }
        let notice = SessionError::RemoteClosed(reason).to_string();
        tracing::info!("{}", notice);
        self.status = SessionStatus::Idle;
        self.error = None;
        self.notice = Some(notice);
        self.publish();
    }

    async fn fail(&mut self, err: SessionError) {
        let pending = match self.session.take() {
            Some(session) => teardown(session).await,
            None => None,
        };
        self.surface_failure(err, pending);
    }

    fn surface_failure(&mut self, err: SessionError, reply: Option<StartReply>) {
        tracing::error!("session failed: {}", err);
        self.error = Some(err.to_string());
        self.notice = None;
        self.status = SessionStatus::Error;
        self.publish();
        self.status = SessionStatus::Idle;
        self.publish();
        if let Some(reply) = reply {
            let _ = reply.send(Err(err));
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            status: self.status,
            persona: self.persona.clone(),
            error: self.error.clone(),
            notice: self.notice.clone(),
            transcript: self.transcript.entries().to_vec(),
            scheduled_buffers: self
                .session
                .as_ref()
                .map(|s| s.scheduler.active_count())
                .unwrap_or(0),
            mic_muted: self.mic_muted,
        };
        self.state_tx.send_replace(snapshot);
    }
}

/// Release everything a session holds. Returns the unresolved start reply,
/// if the session never became active.
async fn teardown(mut session: ActiveSession) -> Option<StartReply> {
    for id in session.scheduler.interrupt() {
        session.timeline.stop(id);
    }
    session.timeline.close();
    session.mic.set_enabled(false);

    let ActiveSession {
        capture,
        playback,
        link,
        pending_start,
        ..
    } = session;
    if let Link::Connecting { task, .. } = &link {
        task.abort();
    }
    drop(link);

    // Joining the device threads blocks
    if tokio::task::spawn_blocking(move || {
        drop(capture);
        drop(playback);
    })
    .await
    .is_err()
    {
        tracing::warn!("audio devices did not shut down cleanly");
    }
    pending_start
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

use crate::capture::{CaptureEvent, CaptureHandle, CaptureNode};
use crate::device::{device_name, DeviceManager};
use crate::output::OutputNode;
use crate::timeline::PlaybackTimeline;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use yuletide_core::AudioError;

// ── StreamGuard ───────────────────────────────────────────────

/// Keeps a device stream alive on its own thread.
///
/// cpal streams cannot move between threads, so the stream is built and
/// dropped on a dedicated thread. Dropping the guard stops the stream and
/// waits for the thread to finish.
pub struct StreamGuard {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamGuard {
    /// Run `build` on a fresh thread and keep its node alive until the guard
    /// is dropped. The handle half of the result is passed back to the caller.
    pub fn spawn<T, H, F>(label: &str, build: F) -> Result<(Self, H), AudioError>
    where
        T: 'static,
        H: Send + 'static,
        F: FnOnce() -> Result<(T, H), AudioError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<H, AudioError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(format!("yuletide-{label}"))
            .spawn(move || match build() {
                Ok((node, handle)) => {
                    if ready_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Returns once the guard drops its sender
                    let _ = stop_rx.recv();
                    drop(node);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(handle)) => Ok((
                Self {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                },
                handle,
            )),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::StreamBuild(format!(
                    "{label} thread exited before the stream opened"
                )))
            }
        }
    }

    /// A guard with nothing behind it, for backends without real devices.
    pub fn detached() -> Self {
        Self {
            stop_tx: None,
            thread: None,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ── AudioBackend ──────────────────────────────────────────────

/// Source of microphone and speaker streams for a session.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Open the microphone and deliver `block_size`-frame blocks on `events`.
    fn open_capture(
        &self,
        block_size: usize,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<(StreamGuard, CaptureHandle), AudioError>;

    /// Open the speaker and drive it from `timeline`.
    fn open_playback(&self, timeline: PlaybackTimeline) -> Result<StreamGuard, AudioError>;
}

/// Real devices through cpal's default host.
pub struct CpalBackend {
    input_device: String,
    output_device: String,
}

impl CpalBackend {
    pub fn new(input_device: &str, output_device: &str) -> Self {
        Self {
            input_device: input_device.to_string(),
            output_device: output_device.to_string(),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_capture(
        &self,
        block_size: usize,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<(StreamGuard, CaptureHandle), AudioError> {
        let name = self.input_device.clone();
        StreamGuard::spawn("capture", move || {
            let device = DeviceManager::new().input_device(&name)?;
            tracing::info!(device = %device_name(&device), "opening microphone");
            CaptureNode::new(&device, block_size, events)
        })
    }

    fn open_playback(&self, timeline: PlaybackTimeline) -> Result<StreamGuard, AudioError> {
        let name = self.output_device.clone();
        let (guard, ()) = StreamGuard::spawn("playback", move || {
            let device = DeviceManager::new().output_device(&name)?;
            tracing::info!(device = %device_name(&device), "opening speaker");
            OutputNode::new(&device, timeline).map(|node| (node, ()))
        })?;
        Ok(guard)
    }
}

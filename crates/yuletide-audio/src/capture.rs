use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use yuletide_core::{AudioChunk, AudioError};

/// What the microphone reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A fixed-size mono block at the device's native rate.
    Block(AudioChunk),
    /// The input stream failed and will deliver nothing further.
    Failed(String),
}

// ── BlockFramer ───────────────────────────────────────────────

/// Regroups variable-sized device callbacks into fixed-size blocks.
pub struct BlockFramer {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockFramer {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        while !samples.is_empty() {
            let take = (self.block_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];
            if self.pending.len() == self.block_size {
                let block =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                emit(block);
            }
        }
    }
}

// ── CaptureHandle ─────────────────────────────────────────────

/// Shared controls for a running microphone stream.
#[derive(Clone)]
pub struct CaptureHandle {
    enabled: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CaptureHandle {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            sample_rate,
        }
    }

    /// Blocks are dropped in the callback while disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, v: bool) {
        self.enabled.store(v, Ordering::Relaxed);
    }

    /// Native rate of the device, which blocks are delivered at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ── CaptureNode ───────────────────────────────────────────────

pub struct CaptureNode {
    _stream: Stream,
}

impl CaptureNode {
    /// Open the device at its default config and start delivering blocks of
    /// `block_size` frames (first channel only).
    pub fn new(
        device: &Device,
        block_size: usize,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<(Self, CaptureHandle), AudioError> {
        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let handle = CaptureHandle::new(config.sample_rate.0);

        tracing::debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            block_size,
            "opening capture stream"
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, &config, block_size, &handle, events),
            SampleFormat::I16 => build_stream::<i16>(device, &config, block_size, &handle, events),
            SampleFormat::U16 => build_stream::<u16>(device, &config, block_size, &handle, events),
            other => Err(AudioError::StreamBuild(format!(
                "unsupported input sample format: {other:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        Ok((Self { _stream: stream }, handle))
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    block_size: usize,
    handle: &CaptureHandle,
    events: mpsc::UnboundedSender<CaptureEvent>,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let sample_rate = config.sample_rate.0;
    let mut framer = BlockFramer::new(block_size);

    let data_handle = handle.clone();
    let data_events = events.clone();

    let err_callback = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        let _ = events.send(CaptureEvent::Failed(err.to_string()));
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !data_handle.is_enabled() {
                    return;
                }
                let mono: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| f32::from_sample(frame[0]))
                    .collect();
                framer.push(&mono, |block| {
                    // Receiver gone means the session was torn down
                    let _ = data_events.send(CaptureEvent::Block(AudioChunk {
                        samples: block,
                        sample_rate,
                        channels: 1,
                    }));
                });
            },
            err_callback,
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

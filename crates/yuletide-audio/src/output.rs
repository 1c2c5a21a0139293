use crate::timeline::PlaybackTimeline;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use yuletide_core::AudioError;

// ── OutputNode ────────────────────────────────────────────────

/// Speaker stream that pulls its samples from a [`PlaybackTimeline`].
pub struct OutputNode {
    _stream: Stream,
}

impl OutputNode {
    pub fn new(device: &Device, timeline: PlaybackTimeline) -> Result<Self, AudioError> {
        let sample_rate = timeline.sample_rate();
        let config = output_config(device, sample_rate)?;
        let channels = config.channels as usize;

        tracing::debug!(sample_rate, channels, "opening playback stream");

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    timeline.render(data, channels);
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        Ok(Self { _stream: stream })
    }
}

/// Pick an f32 config at `sample_rate`, preferring mono, falling back to stereo.
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig, AudioError> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| -> Result<bool, AudioError> {
        let mut configs = device
            .supported_output_configs()
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;
        Ok(configs.any(|c| {
            c.channels() == channels
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        }))
    };

    let channels = if supports(1)? {
        1
    } else if supports(2)? {
        2
    } else {
        return Err(AudioError::StreamBuild(format!(
            "output device cannot play f32 audio at {sample_rate} Hz"
        )));
    };

    Ok(StreamConfig {
        channels,
        sample_rate: rate,
        buffer_size: cpal::BufferSize::Default,
    })
}

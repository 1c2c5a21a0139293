use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type BufferId = u64;

struct ScheduledBuffer {
    id: BufferId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl ScheduledBuffer {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Default)]
struct TimelineInner {
    frames_rendered: u64,
    buffers: Vec<ScheduledBuffer>,
    closed: bool,
}

/// What a scheduled buffer looks like from outside the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledInfo {
    pub id: BufferId,
    pub start_secs: f64,
    pub duration_secs: f64,
}

// ── PlaybackTimeline ──────────────────────────────────────────

/// Mono playback surface with its own device clock.
///
/// Buffers are placed at absolute start times and mixed into whatever the
/// output device pulls through [`render`](Self::render). The clock is the
/// number of frames rendered so far. Each buffer that plays out completely
/// is reported once on the completion channel; buffers removed through
/// [`stop`](Self::stop) or [`close`](Self::close) are not.
#[derive(Clone)]
pub struct PlaybackTimeline {
    inner: Arc<Mutex<TimelineInner>>,
    sample_rate: u32,
    finished_tx: mpsc::UnboundedSender<BufferId>,
}

impl PlaybackTimeline {
    pub fn new(sample_rate: u32) -> (Self, mpsc::UnboundedReceiver<BufferId>) {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let timeline = Self {
            inner: Arc::new(Mutex::new(TimelineInner::default())),
            sample_rate,
            finished_tx,
        };
        (timeline, finished_rx)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device clock in seconds.
    pub fn current_time(&self) -> f64 {
        let frames = self
            .inner
            .lock()
            .map(|inner| inner.frames_rendered)
            .unwrap_or(0);
        frames as f64 / self.sample_rate as f64
    }

    /// Queue `samples` to begin no earlier than `not_before` on the device clock.
    ///
    /// The clock is read under the same lock that places the buffer, so a
    /// start already in the past plays from the next rendered frame. Returns
    /// the start actually used, or `None` once the timeline has been closed.
    pub fn schedule(&self, id: BufferId, samples: Vec<f32>, not_before: f64) -> Option<f64> {
        let mut inner = self.inner.lock().ok()?;
        if inner.closed {
            return None;
        }
        let requested = (not_before.max(0.0) * self.sample_rate as f64).round() as u64;
        let start_frame = requested.max(inner.frames_rendered);
        inner.buffers.push(ScheduledBuffer {
            id,
            start_frame,
            samples,
        });
        Some(start_frame as f64 / self.sample_rate as f64)
    }

    /// Force-stop one buffer. Returns whether it was still scheduled.
    pub fn stop(&self, id: BufferId) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let before = inner.buffers.len();
        inner.buffers.retain(|b| b.id != id);
        inner.buffers.len() != before
    }

    /// Stop everything and refuse further scheduling.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.buffers.clear();
            inner.closed = true;
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledInfo> {
        let rate = self.sample_rate as f64;
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .buffers
                    .iter()
                    .map(|b| ScheduledInfo {
                        id: b.id,
                        start_secs: b.start_frame as f64 / rate,
                        duration_secs: b.samples.len() as f64 / rate,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fill an interleaved output block and advance the clock.
    ///
    /// Every channel receives the same mono signal.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        let channels = channels.max(1);
        let frames = (out.len() / channels) as u64;

        let Ok(mut inner) = self.inner.lock() else {
            // Poisoned mutex: leave silence
            return;
        };

        let block_start = inner.frames_rendered;
        let block_end = block_start + frames;

        for buf in &inner.buffers {
            let from = buf.start_frame.max(block_start);
            let to = buf.end_frame().min(block_end);
            for t in from..to {
                let frame = (t - block_start) as usize;
                let sample = buf.samples[(t - buf.start_frame) as usize];
                for slot in &mut out[frame * channels..(frame + 1) * channels] {
                    *slot += sample;
                }
            }
        }
        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }

        inner.frames_rendered = block_end;
        let finished_tx = &self.finished_tx;
        inner.buffers.retain(|b| {
            if b.end_frame() <= block_end {
                let _ = finished_tx.send(b.id);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_with_render() {
        let (timeline, _rx) = PlaybackTimeline::new(24000);
        assert_eq!(timeline.current_time(), 0.0);
        let mut out = vec![0.0f32; 2400];
        timeline.render(&mut out, 1);
        assert!((timeline.current_time() - 0.1).abs() < 1e-12);
        // stereo: 2400 samples are 1200 frames
        timeline.render(&mut out, 2);
        assert!((timeline.current_time() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_buffer_plays_at_start_time() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        // start at frame 2, three samples
        assert_eq!(timeline.schedule(1, vec![0.1, 0.2, 0.3], 0.2), Some(0.2));
        let mut out = vec![0.0f32; 6];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.0, 0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn test_buffer_spans_render_blocks() {
        let (timeline, mut rx) = PlaybackTimeline::new(10);
        timeline.schedule(7, vec![0.5; 5], 0.0);
        let mut out = vec![0.0f32; 3];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.5; 3]);
        assert!(rx.try_recv().is_err());

        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.5, 0.5, 0.0]);
        assert_eq!(rx.try_recv().unwrap(), 7);
        assert!(timeline.scheduled().is_empty());
    }

    #[test]
    fn test_stereo_duplicates_mono() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        timeline.schedule(1, vec![0.25, -0.25], 0.0);
        let mut out = vec![0.0f32; 4];
        timeline.render(&mut out, 2);
        assert_eq!(out, vec![0.25, 0.25, -0.25, -0.25]);
    }

    #[test]
    fn test_past_start_plays_from_now() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        let mut out = vec![0.0f32; 5];
        timeline.render(&mut out, 1);
        let placed = timeline.schedule(1, vec![0.1, 0.2], 0.0);
        assert_eq!(placed, Some(0.5));
        let info = timeline.scheduled();
        assert_eq!(info.len(), 1);
        assert!((info[0].start_secs - 0.5).abs() < 1e-12);
        timeline.render(&mut out, 1);
        assert_eq!(&out[..2], &[0.1, 0.2]);
    }

    #[test]
    fn test_close_silences_and_skips_completion() {
        let (timeline, mut rx) = PlaybackTimeline::new(10);
        timeline.schedule(1, vec![0.5; 10], 0.0);
        timeline.schedule(2, vec![0.5; 10], 1.0);
        timeline.close();
        let mut out = vec![1.0f32; 4];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.0; 4]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_single_buffer() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        timeline.schedule(1, vec![0.5; 10], 0.0);
        timeline.schedule(2, vec![0.5; 10], 0.0);
        assert!(timeline.stop(1));
        assert!(!timeline.stop(1));
        let ids: Vec<_> = timeline.scheduled().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_overlapping_buffers_mix_and_clamp() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        timeline.schedule(1, vec![0.75; 2], 0.0);
        timeline.schedule(2, vec![0.75; 2], 0.1);
        let mut out = vec![0.0f32; 3];
        timeline.render(&mut out, 1);
        assert_eq!(out, vec![0.75, 1.0, 0.75]);
    }

    #[test]
    fn test_closed_timeline_rejects_schedule() {
        let (timeline, _rx) = PlaybackTimeline::new(10);
        timeline.schedule(1, vec![0.5; 4], 0.0);
        timeline.close();
        assert_eq!(timeline.schedule(2, vec![0.5; 4], 0.0), None);
        assert!(timeline.scheduled().is_empty());
    }

    #[test]
    fn test_empty_buffer_completes_on_next_render() {
        let (timeline, mut rx) = PlaybackTimeline::new(10);
        timeline.schedule(9, Vec::new(), 0.0);
        let mut out = vec![0.0f32; 1];
        timeline.render(&mut out, 1);
        assert_eq!(rx.try_recv().unwrap(), 9);
    }
}

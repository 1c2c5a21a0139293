use std::collections::HashSet;
use yuletide_audio::BufferId;

/// Where a buffer was placed on the playback timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub id: BufferId,
    pub start: f64,
}

/// Gapless back-to-back placement of inbound audio.
///
/// Each buffer starts at `max(now, end of the previous buffer)`. The clock
/// comparison belongs to whoever places the buffer, which reports the start
/// it actually used; the next buffer follows on from there. The set of
/// buffers still playing is tracked until the device reports them finished.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
    active: HashSet<BufferId>,
    next_id: BufferId,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a buffer of `duration` seconds.
    ///
    /// `place` receives the new id and the earliest allowed start, and
    /// returns the start it used, or `None` if the buffer was rejected.
    pub fn schedule<F>(&mut self, duration: f64, place: F) -> Option<Slot>
    where
        F: FnOnce(BufferId, f64) -> Option<f64>,
    {
        let id = self.next_id + 1;
        let start = place(id, self.next_start)?;
        self.next_id = id;
        self.next_start = start.max(self.next_start) + duration;
        self.active.insert(id);
        Some(Slot { id, start })
    }

    /// A buffer played to its end. Returns false for unknown ids.
    pub fn finished(&mut self, id: BufferId) -> bool {
        self.active.remove(&id)
    }

    /// Forget every pending buffer and rewind the marker to zero.
    /// Returns the ids the caller must stop.
    pub fn interrupt(&mut self) -> Vec<BufferId> {
        self.next_start = 0.0;
        let mut ids: Vec<BufferId> = self.active.drain().collect();
        ids.sort_unstable();
        ids
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

use yuletide_core::{Role, TranscriptEntry};

/// Where the next fragment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// No entry is open; the next fragment starts a new line.
    Idle,
    /// `entries[index]` is incomplete and belongs to `role`.
    Accumulating { role: Role, index: usize },
}

/// Conversation log assembled from streamed transcription fragments.
///
/// Consecutive fragments from the same speaker grow one entry until a turn
/// boundary or a fragment from the other speaker.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
    cursor: Cursor,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: Cursor::Idle,
        }
    }

    /// Add a fragment. Returns false if it was empty and nothing changed.
    pub fn append_fragment(&mut self, role: Role, delta: &str) -> bool {
        if delta.is_empty() {
            return false;
        }
        match self.cursor {
            Cursor::Accumulating { role: open, index } if open == role => {
                self.entries[index].text.push_str(delta);
            }
            _ => {
                self.entries.push(TranscriptEntry::new(role, delta));
                self.cursor = Cursor::Accumulating {
                    role,
                    index: self.entries.len() - 1,
                };
            }
        }
        true
    }

    /// Mark the most recent entry complete. Returns false if the log is empty.
    pub fn complete_turn(&mut self) -> bool {
        self.cursor = Cursor::Idle;
        match self.entries.last_mut() {
            Some(entry) => {
                entry.is_complete = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = Cursor::Idle;
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(log: &TranscriptLog) -> Vec<(Role, &str, bool)> {
        log.entries()
            .iter()
            .map(|e| (e.role, e.text.as_str(), e.is_complete))
            .collect()
    }

    #[test]
    fn test_fragments_merge_and_turn_boundary() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::Model, "Hello ");
        log.append_fragment(Role::Model, "world");
        log.complete_turn();
        log.append_fragment(Role::User, "Hi");
        assert_eq!(
            lines(&log),
            vec![
                (Role::Model, "Hello world", true),
                (Role::User, "Hi", false),
            ]
        );
    }

    #[test]
    fn test_same_role_after_completion_starts_new_entry() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::User, "one");
        log.complete_turn();
        log.append_fragment(Role::User, "two");
        assert_eq!(
            lines(&log),
            vec![(Role::User, "one", true), (Role::User, "two", false)]
        );
    }

    #[test]
    fn test_role_switch_leaves_previous_incomplete() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::User, "Are you ");
        log.append_fragment(Role::Model, "Yes");
        log.append_fragment(Role::User, "there?");
        assert_eq!(
            lines(&log),
            vec![
                (Role::User, "Are you ", false),
                (Role::Model, "Yes", false),
                (Role::User, "there?", false),
            ]
        );
    }

    #[test]
    fn test_turn_complete_marks_latest_entry_only() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::User, "a");
        log.append_fragment(Role::Model, "b");
        assert!(log.complete_turn());
        assert_eq!(
            lines(&log),
            vec![(Role::User, "a", false), (Role::Model, "b", true)]
        );
    }

    #[test]
    fn test_empty_fragment_ignored() {
        let mut log = TranscriptLog::new();
        assert!(!log.append_fragment(Role::Model, ""));
        assert!(log.entries().is_empty());

        log.append_fragment(Role::Model, "x");
        let id = log.entries()[0].id.clone();
        assert!(!log.append_fragment(Role::Model, ""));
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].id, id);
    }

    #[test]
    fn test_complete_turn_on_empty_log() {
        let mut log = TranscriptLog::new();
        assert!(!log.complete_turn());
        log.append_fragment(Role::Model, "after");
        assert_eq!(lines(&log), vec![(Role::Model, "after", false)]);
    }

    #[test]
    fn test_merge_keeps_entry_identity() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::Model, "Ho ");
        let first = log.entries()[0].clone();
        log.append_fragment(Role::Model, "ho ho");
        assert_eq!(log.entries()[0].id, first.id);
        assert_eq!(log.entries()[0].timestamp, first.timestamp);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut log = TranscriptLog::new();
        log.append_fragment(Role::Model, "partial");
        log.clear();
        assert!(log.entries().is_empty());
        log.append_fragment(Role::Model, "fresh");
        assert_eq!(lines(&log), vec![(Role::Model, "fresh", false)]);
    }
}

//! Linear undo/redo over full copies of the entry list.
//!
//! Edits push the state they are about to replace. The state that replaced
//! the newest snapshot is only recorded when the user first undoes past it,
//! which is why [`History::undo`] takes the live entries.

use log::{debug, trace};

use crate::playlist::TrackEntry;

pub const DEFAULT_HISTORY_LIMIT: usize = 128;
const MIN_HISTORY_LIMIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    snapshots: Vec<Vec<TrackEntry>>,
    cursor: usize,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            limit: limit.max(MIN_HISTORY_LIMIT),
        }
    }

    /// Records the pre-mutation state. Anything ahead of the cursor is
    /// discarded first.
    pub fn push(&mut self, snapshot: Vec<TrackEntry>) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
            if self.snapshots[self.cursor] == snapshot {
                trace!("History push skipped: identical to cursor snapshot");
                return;
            }
        }
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
        self.enforce_limit();
    }

    /// Steps back one snapshot, returning the entries to apply.
    pub fn undo(&mut self, current: &[TrackEntry]) -> Option<Vec<TrackEntry>> {
        if self.snapshots.is_empty() {
            return None;
        }
        if self.at_newest() && self.snapshots[self.cursor] != current {
            self.snapshots.push(current.to_vec());
            self.enforce_limit();
            return Some(self.snapshots[self.cursor].clone());
        }
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.snapshots[self.cursor].clone())
    }

    /// Steps forward one snapshot, returning the entries to apply.
    pub fn redo(&mut self) -> Option<Vec<TrackEntry>> {
        if self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.snapshots[self.cursor].clone())
    }

    pub fn can_undo(&self, current: &[TrackEntry]) -> bool {
        !self.snapshots.is_empty()
            && (self.cursor > 0 || (self.at_newest() && self.snapshots[self.cursor] != current))
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn at_newest(&self) -> bool {
        self.cursor + 1 == self.snapshots.len()
    }

    fn enforce_limit(&mut self) {
        if self.snapshots.len() > self.limit {
            let overflow = self.snapshots.len() - self.limit;
            self.snapshots.drain(0..overflow);
            self.cursor = self.cursor.saturating_sub(overflow);
            debug!("History trimmed {} oldest snapshot(s)", overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::History;
    use crate::playlist::ordering::renumber;
    use crate::playlist::{TrackDetails, TrackEntry};

    fn playlist(titles: &[&str]) -> Vec<TrackEntry> {
        renumber(
            titles
                .iter()
                .map(|title| TrackEntry {
                    details: TrackDetails {
                        title: Some(title.to_string()),
                        ..TrackDetails::default()
                    },
                    ..TrackEntry::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_undo_restores_pre_mutation_state_and_redo_reapplies() {
        let mut history = History::default();
        let before = playlist(&["A", "B"]);
        let after = playlist(&["B", "A"]);

        history.push(before.clone());
        assert!(history.can_undo(&after));

        assert_eq!(history.undo(&after), Some(before.clone()));
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(after.clone()));
        assert_eq!(history.redo(), None);
        assert_eq!(history.undo(&after), Some(before));
    }

    #[test]
    fn test_boundaries_are_silent_no_ops() {
        let mut history = History::default();
        let current = playlist(&["A"]);
        assert_eq!(history.undo(&current), None);
        assert_eq!(history.redo(), None);
        assert!(!history.can_undo(&current));

        history.push(playlist(&[]));
        assert!(history.undo(&current).is_some());
        assert_eq!(history.undo(&playlist(&[])), None);
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_push_after_undo_discards_redo_branch() {
        let mut history = History::default();
        let a = playlist(&["A"]);
        let ab = playlist(&["A", "B"]);
        let ac = playlist(&["A", "C"]);

        history.push(a.clone());
        assert_eq!(history.undo(&ab), Some(a.clone()));

        history.push(a.clone());
        assert!(!history.can_redo());
        assert_eq!(history.redo(), None);
        assert_eq!(history.undo(&ac), Some(a));
        assert_eq!(history.redo(), Some(ac));
    }

    #[test]
    fn test_consecutive_identical_snapshots_are_not_duplicated() {
        let mut history = History::default();
        history.push(playlist(&["A"]));
        history.push(playlist(&["A"]));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_walks_back_through_several_edits() {
        let mut history = History::default();
        let states = [
            playlist(&[]),
            playlist(&["A"]),
            playlist(&["A", "B"]),
            playlist(&["B"]),
        ];
        for pair in states.windows(2) {
            history.push(pair[0].clone());
        }

        let mut current = states[3].clone();
        for expected in states[..3].iter().rev() {
            current = history.undo(&current).expect("undo available");
            assert_eq!(&current, expected);
        }
        assert_eq!(history.undo(&current), None);
        for expected in &states[1..] {
            assert_eq!(history.redo().as_ref(), Some(expected));
        }
    }

    #[test]
    fn test_limit_drops_oldest_and_keeps_cursor_valid() {
        let mut history = History::with_limit(3);
        for count in 0..6 {
            let titles: Vec<String> = (0..count).map(|index| index.to_string()).collect();
            let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
            history.push(playlist(&titles));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);

        let current = playlist(&["0", "1", "2", "3", "4", "5"]);
        let restored = history.undo(&current).expect("undo available");
        assert_eq!(restored.len(), 5);
        assert_eq!(history.len(), 3);
        assert!(history.cursor() < history.len());
    }

    #[test]
    fn test_limit_never_drops_below_two() {
        assert_eq!(History::with_limit(0).limit(), 2);
    }

    proptest! {
        #[test]
        fn prop_cursor_stays_in_range(ops in proptest::collection::vec(0u8..3, 0..64)) {
            let mut history = History::with_limit(4);
            let mut current = playlist(&[]);
            let mut counter = 0usize;
            for op in ops {
                match op {
                    0 => {
                        history.push(current.clone());
                        counter += 1;
                        let mut next = current.clone();
                        next.push(TrackEntry {
                            details: TrackDetails {
                                title: Some(counter.to_string()),
                                ..TrackDetails::default()
                            },
                            ..TrackEntry::default()
                        });
                        current = renumber(next);
                    }
                    1 => {
                        if let Some(snapshot) = history.undo(&current) {
                            current = snapshot;
                        }
                    }
                    _ => {
                        if let Some(snapshot) = history.redo() {
                            current = snapshot;
                        }
                    }
                }
                prop_assert!(history.len() <= history.limit());
                prop_assert!(history.is_empty() || history.cursor() < history.len());
            }
        }
    }
}

//! Messages exchanged between a playlist session and its persist worker.

use crate::playlist::UpdatePayload;

/// What one write asks the backend to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistChange {
    /// Full-state entries write (`PUT /api/playlists/{id}`).
    Entries(UpdatePayload),
    /// Name change through the rename route.
    Rename(String),
}

impl PersistChange {
    pub fn is_rename(&self) -> bool {
        matches!(self, Self::Rename(_))
    }
}

/// One queued write, tagged with the session's sequence.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    /// Monotonic per session; later writes of the same kind supersede
    /// earlier ones.
    pub sequence: u64,
    pub playlist_id: i64,
    pub change: PersistChange,
}

/// Worker reply for one [`PersistRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved {
        sequence: u64,
        playlist_id: i64,
    },
    Failed {
        sequence: u64,
        playlist_id: i64,
        error: String,
    },
}

impl PersistOutcome {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Saved { sequence, .. } | Self::Failed { sequence, .. } => *sequence,
        }
    }
}

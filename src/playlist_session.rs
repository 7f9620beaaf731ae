//! Optimistic editing session with background persistence.
//!
//! Edits land in the [`PlaylistEditor`] immediately. The resulting full-state
//! payload is queued to a single worker thread, so writes reach the backend
//! in the order they were made. Renames travel the same queue but go to the
//! backend's rename route. When the newest write of a kind fails, that part of
//! the editor is rolled back to what the backend last accepted; a failure that
//! a later write of the same kind already superseded is only logged.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::backends::{BackendError, PlaylistBackend};
use crate::playlist::playlist_editor::{EditError, PlaylistEditor};
use crate::playlist::{Playlist, UpdatePayload};
use crate::protocol::{PersistChange, PersistOutcome, PersistRequest};

pub struct PlaylistSession<B: PlaylistBackend + 'static> {
    backend: Arc<B>,
    editor: PlaylistEditor,
    write_tx: Option<Sender<PersistRequest>>,
    outcome_rx: Receiver<PersistOutcome>,
    worker: Option<JoinHandle<()>>,
    next_sequence: u64,
    latest_entries: Option<u64>,
    latest_rename: Option<u64>,
    in_flight: BTreeMap<u64, PersistChange>,
    confirmed: UpdatePayload,
}

impl<B: PlaylistBackend + 'static> PlaylistSession<B> {
    /// Fetches `playlist_id` and starts editing it.
    pub fn open(
        backend: Arc<B>,
        playlist_id: i64,
        history_limit: usize,
    ) -> Result<Self, BackendError> {
        let playlist = backend.fetch_playlist(playlist_id)?;
        Ok(Self::new(backend, playlist, history_limit))
    }

    /// Starts editing an already fetched playlist.
    pub fn new(backend: Arc<B>, playlist: Playlist, history_limit: usize) -> Self {
        let (write_tx, write_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let worker = spawn_persist_worker(Arc::clone(&backend), write_rx, outcome_tx);

        let mut editor = PlaylistEditor::new(history_limit);
        editor.load(playlist);
        let confirmed = editor.persist_payload();

        Self {
            backend,
            editor,
            write_tx: Some(write_tx),
            outcome_rx,
            worker: Some(worker),
            next_sequence: 0,
            latest_entries: None,
            latest_rename: None,
            in_flight: BTreeMap::new(),
            confirmed,
        }
    }

    pub fn editor(&self) -> &PlaylistEditor {
        &self.editor
    }

    /// Access for view-only changes (selection, sort, filter). Structural
    /// edits made through this handle are not persisted; use [`Self::apply`].
    pub fn editor_mut(&mut self) -> &mut PlaylistEditor {
        &mut self.editor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs an edit and queues its payload. Returns whether anything changed.
    pub fn apply<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut PlaylistEditor) -> Option<UpdatePayload>,
    {
        match edit(&mut self.editor) {
            Some(payload) => {
                self.enqueue(PersistChange::Entries(payload));
                true
            }
            None => false,
        }
    }

    /// Same as [`Self::apply`] for edits that can be rejected.
    pub fn try_apply<F, E>(&mut self, edit: F) -> Result<bool, E>
    where
        F: FnOnce(&mut PlaylistEditor) -> Result<Option<UpdatePayload>, E>,
    {
        match edit(&mut self.editor)? {
            Some(payload) => {
                self.enqueue(PersistChange::Entries(payload));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Renames locally and queues a write to the rename route.
    pub fn rename(&mut self, name: &str) -> Result<bool, EditError> {
        match self.editor.rename(name)? {
            Some(name) => {
                self.enqueue(PersistChange::Rename(name));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn undo(&mut self) -> bool {
        self.apply(PlaylistEditor::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.apply(PlaylistEditor::redo)
    }

    /// Sequence number of the newest queued write, if any.
    pub fn latest_sequence(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    pub fn pending_writes(&self) -> usize {
        self.in_flight.len()
    }

    /// Applies every outcome the worker has reported so far.
    pub fn poll_outcomes(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.handle_outcome(outcome);
            handled += 1;
        }
        handled
    }

    /// Blocks until every queued write has been answered or `timeout`
    /// elapses. Returns `true` when nothing is left in flight.
    pub fn flush(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.outcome_rx.recv_timeout(remaining) {
                Ok(outcome) => self.handle_outcome(outcome),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Timed out with {} playlist write(s) still pending",
                        self.in_flight.len()
                    );
                    return false;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Persist worker stopped with writes pending");
                    return false;
                }
            }
        }
        true
    }

    /// Reloads the playlist from the backend, discarding local history.
    pub fn refresh(&mut self) -> Result<(), BackendError> {
        let playlist_id = match self.editor.playlist_id() {
            Ok(id) => id,
            Err(_) => return Ok(()),
        };
        let playlist = self.backend.fetch_playlist(playlist_id)?;
        self.editor.load(playlist);
        self.confirmed = self.editor.persist_payload();
        Ok(())
    }

    fn enqueue(&mut self, change: PersistChange) {
        let playlist_id = match self.editor.playlist_id() {
            Ok(id) => id,
            Err(err) => {
                warn!("Not saving playlist edit: {}", err);
                self.editor.set_status(err.to_string());
                return;
            }
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        match &change {
            PersistChange::Entries(payload) => {
                self.latest_entries = Some(sequence);
                debug!(
                    "Queued write {} for playlist {} ({} entries)",
                    sequence,
                    playlist_id,
                    payload.entries.len()
                );
            }
            PersistChange::Rename(name) => {
                self.latest_rename = Some(sequence);
                debug!(
                    "Queued rename {} for playlist {} to '{}'",
                    sequence, playlist_id, name
                );
            }
        }
        self.in_flight.insert(sequence, change.clone());

        let request = PersistRequest {
            sequence,
            playlist_id,
            change,
        };
        let sent = self
            .write_tx
            .as_ref()
            .is_some_and(|sender| sender.send(request).is_ok());
        if !sent {
            self.handle_outcome(PersistOutcome::Failed {
                sequence,
                playlist_id,
                error: "persist worker is not running".to_string(),
            });
        }
    }

    fn handle_outcome(&mut self, outcome: PersistOutcome) {
        let sequence = outcome.sequence();
        let Some(change) = self.in_flight.remove(&sequence) else {
            warn!("Outcome for unknown write {}", sequence);
            return;
        };
        match outcome {
            PersistOutcome::Saved { playlist_id, .. } => {
                debug!("Write {} for playlist {} saved", sequence, playlist_id);
                match change {
                    PersistChange::Entries(payload) => self.confirmed.entries = payload.entries,
                    PersistChange::Rename(name) => self.confirmed.name = name,
                }
            }
            PersistOutcome::Failed {
                playlist_id, error, ..
            } => {
                let latest = if change.is_rename() {
                    self.latest_rename
                } else {
                    self.latest_entries
                };
                if Some(sequence) != latest {
                    warn!(
                        "Superseded write {} for playlist {} failed: {}",
                        sequence, playlist_id, error
                    );
                    return;
                }
                warn!(
                    "Write {} for playlist {} failed, rolling back: {}",
                    sequence, playlist_id, error
                );
                match change {
                    PersistChange::Entries(_) => {
                        let entries = self.confirmed.entries.clone();
                        self.editor.restore(entries);
                        self.editor
                            .set_status(format!("Failed to save playlist: {error}"));
                    }
                    PersistChange::Rename(_) => {
                        let name = self.confirmed.name.clone();
                        self.editor.revert_name(&name);
                        self.editor
                            .set_status(format!("Failed to rename playlist: {error}"));
                    }
                }
            }
        }
    }
}

impl<B: PlaylistBackend + 'static> Drop for PlaylistSession<B> {
    fn drop(&mut self) {
        self.write_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Persist worker panicked");
            }
        }
    }
}

fn spawn_persist_worker<B: PlaylistBackend + 'static>(
    backend: Arc<B>,
    requests: Receiver<PersistRequest>,
    outcomes: Sender<PersistOutcome>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(request) = requests.recv() {
            let PersistRequest {
                sequence,
                playlist_id,
                change,
            } = request;
            let result = match &change {
                PersistChange::Entries(payload) => backend.update_entries(playlist_id, payload),
                PersistChange::Rename(name) => backend.rename_playlist(playlist_id, name),
            };
            let outcome = match result {
                Ok(()) => PersistOutcome::Saved {
                    sequence,
                    playlist_id,
                },
                Err(err) => PersistOutcome::Failed {
                    sequence,
                    playlist_id,
                    error: err.to_string(),
                },
            };
            if outcomes.send(outcome).is_err() {
                break;
            }
        }
        info!("Persist worker exiting");
    })
}

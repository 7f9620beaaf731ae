//! Owner of the playlist being edited and all of its view state.
//!
//! Every structural edit goes through the same steps: compute the next
//! entry list with the ordering engine, bail out if nothing changed, push the
//! previous list onto the history, apply, then remap and reconcile the
//! selection. The caller gets back the payload that should be persisted.

use std::collections::BTreeSet;

use log::{debug, info};
use serde_json::Value;

use crate::playlist::history::{History, DEFAULT_HISTORY_LIMIT};
use crate::playlist::ordering::{self, OrderingError, SortColumn, SortDirection};
use crate::playlist::selection::Selection;
use crate::playlist::{Playlist, TrackEntry, UpdatePayload};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    #[error("reordering is disabled while the view is sorted or filtered")]
    ReorderLocked,
    #[error("no saved playlist is loaded")]
    NoPlaylist,
    #[error("playlist name cannot be empty")]
    EmptyName,
}

#[derive(Debug, Clone)]
pub struct PlaylistEditor {
    playlist: Playlist,
    selection: Selection,
    history: History,
    sort_column: SortColumn,
    sort_direction: SortDirection,
    filter: String,
    status: Option<String>,
}

impl Default for PlaylistEditor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl PlaylistEditor {
    pub fn new(history_limit: usize) -> Self {
        Self {
            playlist: Playlist::default(),
            selection: Selection::new(),
            history: History::with_limit(history_limit),
            sort_column: SortColumn::default(),
            sort_direction: SortDirection::default(),
            filter: String::new(),
            status: None,
        }
    }

    /// Replaces the edited playlist. History and selection start over.
    pub fn load(&mut self, mut playlist: Playlist) {
        if !ordering::is_contiguous(&playlist.entries) {
            playlist.entries = ordering::renumber(playlist.entries);
        }
        info!(
            "Editing playlist {:?} '{}' ({} entries)",
            playlist.id,
            playlist.name,
            playlist.entries.len()
        );
        self.playlist = playlist;
        self.selection.clear();
        self.history.clear();
        self.status = None;
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn playlist_id(&self) -> Result<i64, EditError> {
        self.playlist.id.ok_or(EditError::NoPlaylist)
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.playlist.entries
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sort(&self) -> (SortColumn, SortDirection) {
        (self.sort_column, self.sort_direction)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// The full state as it should be stored by the backend.
    pub fn persist_payload(&self) -> UpdatePayload {
        UpdatePayload {
            name: self.playlist.name.clone(),
            entries: self.playlist.entries.clone(),
        }
    }

    /// Appends raw track payloads from search or suggestion results.
    pub fn add_raw(&mut self, raw: &[Value]) -> Option<UpdatePayload> {
        if raw.is_empty() {
            return None;
        }
        let next = ordering::append(&self.playlist.entries, raw);
        self.apply(next)
    }

    /// Appends entries that were normalized already.
    pub fn add_tracks(&mut self, entries: Vec<TrackEntry>) -> Option<UpdatePayload> {
        if entries.is_empty() {
            return None;
        }
        let next = ordering::append_entries(&self.playlist.entries, entries);
        self.apply(next)
    }

    /// Inserts raw payloads at drop gap `gap`.
    pub fn insert_tracks(
        &mut self,
        raw: &[Value],
        gap: usize,
    ) -> Result<Option<UpdatePayload>, EditError> {
        self.ensure_reorder_allowed()?;
        let next = ordering::insert_at(&self.playlist.entries, raw, gap)?;
        if raw.is_empty() {
            return Ok(None);
        }
        self.selection.after_insert(gap, raw.len());
        Ok(self.apply(next))
    }

    /// Replaces the rows wholesale as one undoable edit. Selection survives
    /// only where the row count still covers it.
    pub fn replace_with(&mut self, entries: Vec<TrackEntry>) -> Option<UpdatePayload> {
        let next = ordering::renumber(entries);
        self.apply(next)
    }

    pub fn remove_orders(&mut self, orders: &BTreeSet<usize>) -> Option<UpdatePayload> {
        let next = ordering::remove_by_order(&self.playlist.entries, orders);
        if next.len() == self.playlist.entries.len() {
            return None;
        }
        self.selection.after_remove(orders);
        self.apply(next)
    }

    pub fn remove_selected(&mut self) -> Option<UpdatePayload> {
        let orders = self.selection.orders().clone();
        self.remove_orders(&orders)
    }

    pub fn remove_by_album(&mut self, album: &str) -> Option<UpdatePayload> {
        let orders = ordering::orders_by_album(&self.playlist.entries, album);
        self.remove_orders(&orders)
    }

    pub fn remove_by_artist(&mut self, artist: &str) -> Option<UpdatePayload> {
        let orders = ordering::orders_by_artist(&self.playlist.entries, artist);
        self.remove_orders(&orders)
    }

    /// Moves one row. Indices are list positions in playlist order.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<Option<UpdatePayload>, EditError> {
        self.ensure_reorder_allowed()?;
        let next = ordering::move_entry(&self.playlist.entries, from, to)?;
        if next == self.playlist.entries {
            return Ok(None);
        }
        self.selection.after_move(self.playlist.entries.len(), from, to)?;
        Ok(self.apply(next))
    }

    /// Moves every selected row to drop gap `gap`.
    pub fn move_selected(&mut self, gap: usize) -> Result<Option<UpdatePayload>, EditError> {
        self.ensure_reorder_allowed()?;
        let indices = self.selection.indices();
        if indices.is_empty() {
            return Ok(None);
        }
        let next = ordering::move_entries(&self.playlist.entries, &indices, gap)?;
        if next == self.playlist.entries {
            return Ok(None);
        }
        self.selection
            .after_multi_move(self.playlist.entries.len(), &indices, gap)?;
        Ok(self.apply(next))
    }

    pub fn toggle_selection(&mut self, order: usize) {
        if order < self.playlist.entries.len() {
            self.selection.toggle(order);
        }
    }

    pub fn select_all(&mut self) {
        self.selection = Selection::select_all(&self.playlist.entries);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Checkbox semantics: clears when everything is selected.
    pub fn toggle_all(&mut self) {
        if !self.selection.is_empty() && self.selection.all_selected(&self.playlist.entries) {
            self.selection.clear();
        } else {
            self.select_all();
        }
    }

    pub fn all_selected(&self) -> bool {
        self.selection.all_selected(&self.playlist.entries)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo(&self.playlist.entries)
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Option<UpdatePayload> {
        let snapshot = self.history.undo(&self.playlist.entries)?;
        debug!("Undo to history cursor {}", self.history.cursor());
        Some(self.replace_entries(snapshot))
    }

    pub fn redo(&mut self) -> Option<UpdatePayload> {
        let snapshot = self.history.redo()?;
        debug!("Redo to history cursor {}", self.history.cursor());
        Some(self.replace_entries(snapshot))
    }

    /// Puts back entries after a failed save. The rejected state is pushed
    /// onto the history, so undo re-applies it.
    pub fn restore(&mut self, snapshot: Vec<TrackEntry>) {
        if snapshot == self.playlist.entries {
            return;
        }
        let rejected = std::mem::replace(&mut self.playlist.entries, snapshot);
        self.history.push(rejected);
        self.selection.reconcile(&self.playlist.entries);
    }

    /// Puts back a name the backend refused. Not recorded in history.
    pub fn revert_name(&mut self, name: &str) {
        self.playlist.name = name.to_string();
    }

    /// Returns the trimmed new name, or `None` when it is unchanged. The
    /// backend stores names through its rename route, not the entries write.
    pub fn rename(&mut self, name: &str) -> Result<Option<String>, EditError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditError::EmptyName);
        }
        if name == self.playlist.name {
            return Ok(None);
        }
        self.playlist.name = name.to_string();
        Ok(Some(self.playlist.name.clone()))
    }

    /// Selecting the active column again flips the direction.
    pub fn set_sort(&mut self, column: SortColumn) {
        if column == self.sort_column {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_column = column;
            self.sort_direction = SortDirection::Ascending;
        }
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_string();
    }

    /// Rows in display order. Never alters `order`.
    pub fn view(&self) -> Vec<&TrackEntry> {
        let sorted = ordering::sorted_view(
            &self.playlist.entries,
            self.sort_column,
            self.sort_direction,
        );
        ordering::filtered_view(sorted, &self.filter)
    }

    /// Drag positions only mean list positions in the unsorted, unfiltered view.
    pub fn reorder_allowed(&self) -> bool {
        self.sort_column == SortColumn::Order
            && self.sort_direction == SortDirection::Ascending
            && self.filter.is_empty()
    }

    fn ensure_reorder_allowed(&self) -> Result<(), EditError> {
        if self.reorder_allowed() {
            Ok(())
        } else {
            Err(EditError::ReorderLocked)
        }
    }

    fn apply(&mut self, next: Vec<TrackEntry>) -> Option<UpdatePayload> {
        if next == self.playlist.entries {
            return None;
        }
        let previous = std::mem::replace(&mut self.playlist.entries, next);
        self.history.push(previous);
        self.selection.reconcile(&self.playlist.entries);
        debug!(
            "Playlist edit applied: {} entries, history depth {}",
            self.playlist.entries.len(),
            self.history.len()
        );
        Some(self.persist_payload())
    }

    fn replace_entries(&mut self, entries: Vec<TrackEntry>) -> UpdatePayload {
        self.playlist.entries = entries;
        self.selection.reconcile(&self.playlist.entries);
        self.persist_payload()
    }
}

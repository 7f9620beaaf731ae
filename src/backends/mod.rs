//! Playlist and library backend abstractions.
//!
//! The editing core never talks to the network itself; sessions and the CLI
//! go through these traits so tests can substitute an in-memory backend.

pub mod http_backend;

use log::info;
use serde_json::Value;

use crate::playlist::{
    FilterQuery, LibraryStats, Playlist, PlaylistSummary, TrackEntry, UpdatePayload,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Playlist CRUD against the backend.
pub trait PlaylistBackend: Send + Sync {
    fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, BackendError>;
    /// Fetches every entry, sorted and renumbered by `order`.
    fn fetch_playlist(&self, playlist_id: i64) -> Result<Playlist, BackendError>;
    /// Creates an empty playlist and returns its id.
    fn create_playlist(&self, name: &str) -> Result<i64, BackendError>;
    /// Replaces the stored name and entries wholesale.
    fn update_entries(&self, playlist_id: i64, payload: &UpdatePayload)
        -> Result<(), BackendError>;
    fn rename_playlist(&self, playlist_id: i64, new_name: &str) -> Result<(), BackendError>;
    fn delete_playlist(&self, playlist_id: i64) -> Result<(), BackendError>;
    /// M3U text of the playlist.
    fn export_m3u(&self, playlist_id: i64) -> Result<String, BackendError>;
    fn sync_to_plex(&self, playlist_id: i64) -> Result<(), BackendError>;
}

/// Library browsing and track suggestions.
pub trait LibraryBackend: Send + Sync {
    fn search_library(&self, query: &str) -> Result<Vec<TrackEntry>, BackendError>;
    fn scan(&self, full: bool) -> Result<(), BackendError>;
    fn stats(&self) -> Result<LibraryStats, BackendError>;
    /// Swaps each entry for its local library match when one exists.
    fn find_local_files(&self, entries: &[TrackEntry]) -> Result<Vec<TrackEntry>, BackendError>;
    fn filter(&self, query: &FilterQuery) -> Result<Vec<TrackEntry>, BackendError>;
    fn similar_from_lastfm(&self, artist: &str, title: &str)
        -> Result<Vec<TrackEntry>, BackendError>;
    fn similar_from_openai(&self, artist: &str, title: &str)
        -> Result<Vec<TrackEntry>, BackendError>;
    fn lookup_lastfm_track(&self, title: &str, artist: &str) -> Result<TrackEntry, BackendError>;
}

/// Copies `source_id` into a new playlist named `new_name`.
pub fn clone_playlist<B: PlaylistBackend + ?Sized>(
    backend: &B,
    source_id: i64,
    new_name: &str,
) -> Result<i64, BackendError> {
    let source = backend.fetch_playlist(source_id)?;
    let new_id = backend.create_playlist(new_name)?;
    backend.update_entries(
        new_id,
        &UpdatePayload {
            name: new_name.to_string(),
            entries: source.entries,
        },
    )?;
    info!(
        "Cloned playlist {} into {} '{}'",
        source_id, new_id, new_name
    );
    Ok(new_id)
}

/// Reads a JSON array of playlists; non-object rows are skipped.
pub(crate) fn parse_playlist_summaries(value: &Value) -> Vec<PlaylistSummary> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(Value::as_i64)?;
                    let name = item
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("Untitled")
                        .to_string();
                    let entry_count = item
                        .get("entries")
                        .and_then(Value::as_array)
                        .map(Vec::len)
                        .unwrap_or(0);
                    Some(PlaylistSummary {
                        id,
                        name,
                        entry_count,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

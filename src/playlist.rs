//! Playlist data model and the editing core built on top of it.
//!
//! Entries are kept in a plain `Vec` whose `order` fields always read
//! `0..N-1`. Every submodule treats that as a hard invariant: the ordering
//! engine renumbers before returning, the selection tracker only holds values
//! that exist in the current sequence, and history snapshots are full copies.

pub mod history;
pub mod ordering;
pub mod playlist_editor;
pub mod selection;

use std::collections::BTreeMap;

/// Source of a playlist row; decides which fields are authoritative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    MusicFile,
    Lastfm,
    NestedPlaylist,
    #[default]
    Requested,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MusicFile => "music_file",
            Self::Lastfm => "lastfm",
            Self::NestedPlaylist => "nested_playlist",
            Self::Requested => "requested",
        }
    }

    /// Parses the wire tag. Unknown tags yield `None` so callers can infer.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "music_file" => Some(Self::MusicFile),
            "lastfm" => Some(Self::Lastfm),
            "nested_playlist" => Some(Self::NestedPlaylist),
            "requested" => Some(Self::Requested),
            _ => None,
        }
    }
}

/// Denormalized descriptive payload cached on each entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct TrackDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    /// Track length in seconds; `0` when unknown.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub missing: bool,
}

/// One playlist row.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct TrackEntry {
    /// Backend row id, when the entry has been persisted before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub order: usize,
    pub entry_type: EntryType,
    #[serde(default)]
    pub music_file_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub details: TrackDetails,
    #[serde(default)]
    pub missing: bool,
}

impl TrackEntry {
    pub fn title(&self) -> Option<&str> {
        self.details.title.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.details.artist.as_deref()
    }

    pub fn album(&self) -> Option<&str> {
        self.details.album.as_deref()
    }

    /// Artist used for display and sorting: track artist, else album artist.
    pub fn display_artist(&self) -> Option<&str> {
        self.details
            .artist
            .as_deref()
            .or(self.details.album_artist.as_deref())
    }

    /// Single-line label used by the command-line views.
    pub fn label(&self) -> String {
        let title = self.title().unwrap_or("(untitled)");
        match self.display_artist() {
            Some(artist) => format!("{artist} - {title}"),
            None => title.to_string(),
        }
    }
}

/// A playlist as fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Playlist {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<TrackEntry>,
}

/// Listing row for the playlist index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
    pub entry_count: usize,
}

/// Body of `PUT /api/playlists/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UpdatePayload {
    pub name: String,
    pub entries: Vec<TrackEntry>,
}

/// Library-wide counters reported by the backend.
///
/// The backend has changed this shape before, so unknown keys are kept
/// rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct LibraryStats {
    #[serde(default)]
    pub total_tracks: Option<u64>,
    #[serde(default)]
    pub total_artists: Option<u64>,
    #[serde(default)]
    pub total_albums: Option<u64>,
    #[serde(default)]
    pub total_playlists: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Per-field library filter for `GET /api/filter`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FilterQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub limit: u32,
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self {
            full_search: None,
            album: None,
            title: None,
            artist: None,
            limit: 50,
        }
    }
}

impl FilterQuery {
    /// Non-empty parameters as query-string pairs.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let optional = [
            ("full_search", &self.full_search),
            ("album", &self.album),
            ("title", &self.title),
            ("artist", &self.artist),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim) {
                if !value.is_empty() {
                    pairs.push((key, value.to_string()));
                }
            }
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

//! Maps the backend's assorted track payloads onto [`TrackEntry`].
//!
//! Library search results, Last.fm lookups, AI suggestions and stored
//! playlist rows all describe a track slightly differently. Everything that
//! enters a playlist passes through [`normalize`], often more than once, so
//! normalization must be idempotent and must never fail.

use serde_json::{Map, Value};

use crate::playlist::{EntryType, TrackDetails, TrackEntry};

/// Keys under which a row may carry its descriptive payload.
const DETAIL_KEYS: [&str; 2] = ["details", "music_file_details"];

/// Normalizes a single raw payload. Absent or malformed fields degrade to
/// defaults: `None` for text, `0` for length, empty genres.
pub fn normalize(raw: &Value) -> TrackEntry {
    let empty = Map::new();
    let item = raw.as_object().unwrap_or(&empty);
    let nested = DETAIL_KEYS
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_object));
    let details_source = nested.unwrap_or(item);

    let entry_type = item
        .get("entry_type")
        .and_then(Value::as_str)
        .and_then(EntryType::parse)
        .unwrap_or_else(|| infer_entry_type(item, details_source));

    // A flat payload's `id` is the catalog id; a row's `id` is the row id.
    let (row_id, detail_id) = if nested.is_some() {
        (int_field(item, "id"), int_field(details_source, "id"))
    } else {
        (None, int_field(item, "id"))
    };

    let music_file_id = int_field(item, "music_file_id").or(match entry_type {
        EntryType::MusicFile => detail_id,
        _ => None,
    });

    let missing = bool_field(details_source, "missing") || bool_field(item, "missing");

    let details = TrackDetails {
        id: detail_id,
        title: text_field(details_source, "title"),
        artist: text_field(details_source, "artist"),
        album: text_field(details_source, "album"),
        album_artist: text_field(details_source, "album_artist"),
        year: text_field(details_source, "year"),
        length: length_field(details_source),
        genres: genres_field(details_source),
        path: text_field(details_source, "path"),
        publisher: text_field(details_source, "publisher"),
        kind: text_field(details_source, "kind"),
        missing,
    };

    TrackEntry {
        id: row_id,
        order: int_field(item, "order")
            .and_then(|order| usize::try_from(order).ok())
            .unwrap_or(0),
        entry_type,
        music_file_id,
        playlist_id: int_field(item, "playlist_id"),
        url: text_field(item, "url").or_else(|| text_field(details_source, "url")),
        details,
        missing,
    }
}

/// Normalizes every payload in order.
pub fn normalize_all(raw: &[Value]) -> Vec<TrackEntry> {
    raw.iter().map(normalize).collect()
}

/// Stamps a source tag onto a raw payload before normalization.
///
/// Suggestion endpoints return bare track objects; the caller knows which
/// source they came from.
pub fn tag_source(mut raw: Value, entry_type: EntryType) -> Value {
    if let Some(object) = raw.as_object_mut() {
        object.insert(
            "entry_type".to_string(),
            Value::String(entry_type.as_str().to_string()),
        );
    }
    raw
}

fn infer_entry_type(item: &Map<String, Value>, details: &Map<String, Value>) -> EntryType {
    if text_field(item, "url").is_some() || text_field(details, "url").is_some() {
        EntryType::Lastfm
    } else if int_field(item, "playlist_id").is_some() {
        EntryType::NestedPlaylist
    } else if int_field(item, "music_file_id").is_some()
        || (int_field(details, "id").is_some() && text_field(details, "path").is_some())
    {
        EntryType::MusicFile
    } else {
        EntryType::Requested
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn int_field(object: &Map<String, Value>, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn bool_field(object: &Map<String, Value>, key: &str) -> bool {
    match object.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_i64().is_some_and(|value| value != 0),
        _ => false,
    }
}

fn length_field(object: &Map<String, Value>) -> u64 {
    match object.get("length") {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|value| *value > 0.0).map(|value| value as u64))
            .unwrap_or(0),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value > 0.0)
            .map(|value| value as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn genres_field(object: &Map<String, Value>) -> Vec<String> {
    match object.get("genres") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        Some(Value::String(genre)) if !genre.trim().is_empty() => vec![genre.trim().to_string()],
        _ => Vec::new(),
    }
}

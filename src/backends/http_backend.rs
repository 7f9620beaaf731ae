//! JSON-over-HTTP backend client built on `ureq`.

use std::time::Duration;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::backends::{parse_playlist_summaries, BackendError, LibraryBackend, PlaylistBackend};
use crate::config::BackendConfig;
use crate::playlist::ordering;
use crate::playlist::{
    EntryType, FilterQuery, LibraryStats, Playlist, PlaylistSummary, TrackEntry, UpdatePayload,
};
use crate::track_model;

/// Client for the playlist server's `/api` routes.
pub struct HttpBackend {
    base_url: String,
    agent: ureq::Agent,
    page_size: usize,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        page_size: usize,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            agent,
            page_size: page_size.max(1),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.read_timeout_secs),
            config.page_size,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query_string(params))
        }
    }

    fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, BackendError> {
        let url = self.url(path, params);
        debug!("GET {}", url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| map_ureq_error(&url, err))?;
        read_json(&url, response)
    }

    fn get_text(&self, path: &str) -> Result<String, BackendError> {
        let url = self.url(path, &[]);
        debug!("GET {}", url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| map_ureq_error(&url, err))?;
        response.into_string().map_err(|err| BackendError::Decode {
            url: url.clone(),
            message: err.to_string(),
        })
    }

    fn send_json(&self, method: &str, path: &str, body: Value) -> Result<Value, BackendError> {
        let url = self.url(path, &[]);
        debug!("{} {}", method, url);
        let response = self
            .agent
            .request(method, &url)
            .send_json(body)
            .map_err(|err| map_ureq_error(&url, err))?;
        let text = response.into_string().map_err(|err| BackendError::Decode {
            url: url.clone(),
            message: err.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| BackendError::Decode {
            url,
            message: err.to_string(),
        })
    }

    fn fetch_count(&self, playlist_id: i64) -> Result<usize, BackendError> {
        let path = format!("/api/playlists/{playlist_id}/count");
        let value = self.get_json(&path, &[])?;
        value
            .get("count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| BackendError::Decode {
                url: self.url(&path, &[]),
                message: "missing `count`".to_string(),
            })
    }
}

impl PlaylistBackend for HttpBackend {
    fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, BackendError> {
        let value = self.get_json("/api/playlists", &[])?;
        Ok(parse_playlist_summaries(&value))
    }

    fn fetch_playlist(&self, playlist_id: i64) -> Result<Playlist, BackendError> {
        let count = self.fetch_count(playlist_id)?;
        let path = format!("/api/playlists/{playlist_id}");

        let mut playlist: Option<Playlist> = None;
        loop {
            let offset = playlist.as_ref().map_or(0, |loaded| loaded.entries.len());
            let params = [
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            let chunk = self.get_json(&path, &params)?;
            let chunk = parse_playlist(&self.url(&path, &params), &chunk)?;
            let received = chunk.entries.len();
            match playlist.as_mut() {
                Some(loaded) => loaded.entries.extend(chunk.entries),
                None => playlist = Some(chunk),
            }
            let loaded = playlist.as_ref().map_or(0, |loaded| loaded.entries.len());
            if received == 0 || loaded >= count {
                break;
            }
        }

        let mut playlist = playlist.unwrap_or_default();
        playlist.id.get_or_insert(playlist_id);
        if playlist.entries.len() != count {
            warn!(
                "Playlist {} reported {} entries but {} were returned",
                playlist_id,
                count,
                playlist.entries.len()
            );
        }
        playlist.entries.sort_by_key(|entry| entry.order);
        if !ordering::is_contiguous(&playlist.entries) {
            warn!("Playlist {} has gaps in its order values; renumbering", playlist_id);
            playlist.entries = ordering::renumber(playlist.entries);
        }
        Ok(playlist)
    }

    fn create_playlist(&self, name: &str) -> Result<i64, BackendError> {
        let value = self.send_json(
            "POST",
            "/api/playlists",
            json!({ "name": name, "entries": [] }),
        )?;
        value
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| BackendError::Decode {
                url: self.url("/api/playlists", &[]),
                message: "created playlist has no `id`".to_string(),
            })
    }

    fn update_entries(
        &self,
        playlist_id: i64,
        payload: &UpdatePayload,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_value(payload).map_err(|err| BackendError::Decode {
            url: self.url(&format!("/api/playlists/{playlist_id}"), &[]),
            message: err.to_string(),
        })?;
        self.send_json("PUT", &format!("/api/playlists/{playlist_id}"), body)?;
        Ok(())
    }

    fn rename_playlist(&self, playlist_id: i64, new_name: &str) -> Result<(), BackendError> {
        self.send_json(
            "POST",
            &format!("/api/playlists/rename/{playlist_id}"),
            json!({ "new_name": new_name, "description": "" }),
        )?;
        Ok(())
    }

    fn delete_playlist(&self, playlist_id: i64) -> Result<(), BackendError> {
        let url = self.url(&format!("/api/playlists/{playlist_id}"), &[]);
        debug!("DELETE {}", url);
        self.agent
            .delete(&url)
            .call()
            .map_err(|err| map_ureq_error(&url, err))?;
        Ok(())
    }

    fn export_m3u(&self, playlist_id: i64) -> Result<String, BackendError> {
        self.get_text(&format!("/api/playlists/{playlist_id}/export"))
    }

    fn sync_to_plex(&self, playlist_id: i64) -> Result<(), BackendError> {
        self.get_text(&format!("/api/playlists/{playlist_id}/synctoplex"))?;
        Ok(())
    }
}

impl LibraryBackend for HttpBackend {
    fn search_library(&self, query: &str) -> Result<Vec<TrackEntry>, BackendError> {
        let params = [("query", query.to_string())];
        let value = self.get_json("/api/library/search", &params)?;
        entries_from_array(&self.url("/api/library/search", &params), &value, None)
    }

    fn scan(&self, full: bool) -> Result<(), BackendError> {
        let path = if full { "/api/fullscan" } else { "/api/scan" };
        self.get_text(path)?;
        Ok(())
    }

    fn stats(&self) -> Result<LibraryStats, BackendError> {
        let value = self.get_json("/api/stats", &[])?;
        serde_json::from_value(value).map_err(|err| BackendError::Decode {
            url: self.url("/api/stats", &[]),
            message: err.to_string(),
        })
    }

    fn find_local_files(&self, entries: &[TrackEntry]) -> Result<Vec<TrackEntry>, BackendError> {
        let path = "/api/library/findlocals";
        let body = serde_json::to_value(entries).map_err(|err| BackendError::Decode {
            url: self.url(path, &[]),
            message: err.to_string(),
        })?;
        let value = self.send_json("POST", path, body)?;
        let matches = value.as_array().ok_or_else(|| BackendError::Decode {
            url: self.url(path, &[]),
            message: "expected an array".to_string(),
        })?;
        Ok(merge_local_matches(entries, matches))
    }

    fn filter(&self, query: &FilterQuery) -> Result<Vec<TrackEntry>, BackendError> {
        let params = query.query_pairs();
        let value = self.get_json("/api/filter", &params)?;
        entries_from_array(&self.url("/api/filter", &params), &value, None)
    }

    fn similar_from_lastfm(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Vec<TrackEntry>, BackendError> {
        let params = [("artist", artist.to_string()), ("title", title.to_string())];
        let value = self.get_json("/api/lastfm/similar", &params)?;
        entries_from_array(
            &self.url("/api/lastfm/similar", &params),
            &value,
            Some(EntryType::Lastfm),
        )
    }

    fn similar_from_openai(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Vec<TrackEntry>, BackendError> {
        let params = [("artist", artist.to_string()), ("title", title.to_string())];
        let value = self.get_json("/api/openai/similar", &params)?;
        let tracks = value.get("tracks").cloned().unwrap_or(Value::Null);
        entries_from_array(
            &self.url("/api/openai/similar", &params),
            &tracks,
            Some(EntryType::Requested),
        )
    }

    fn lookup_lastfm_track(&self, title: &str, artist: &str) -> Result<TrackEntry, BackendError> {
        let params = [("title", title.to_string()), ("artist", artist.to_string())];
        let value = self.get_json("/api/lastfm", &params)?;
        if !value.is_object() {
            return Err(BackendError::Decode {
                url: self.url("/api/lastfm", &params),
                message: "expected a track object".to_string(),
            });
        }
        Ok(track_model::normalize(&track_model::tag_source(
            value,
            EntryType::Lastfm,
        )))
    }
}

/// `key=value` pairs joined with `&`, values percent-encoded.
pub fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses one `GET /api/playlists/{id}` body.
pub fn parse_playlist(url: &str, value: &Value) -> Result<Playlist, BackendError> {
    let object = value.as_object().ok_or_else(|| BackendError::Decode {
        url: url.to_string(),
        message: "expected a playlist object".to_string(),
    })?;
    let entries = object
        .get("entries")
        .and_then(Value::as_array)
        .map(|items| track_model::normalize_all(items))
        .unwrap_or_default();
    Ok(Playlist {
        id: object.get("id").and_then(Value::as_i64),
        name: object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        entries,
    })
}

fn entries_from_array(
    url: &str,
    value: &Value,
    source: Option<EntryType>,
) -> Result<Vec<TrackEntry>, BackendError> {
    let items = value.as_array().ok_or_else(|| BackendError::Decode {
        url: url.to_string(),
        message: "expected an array of tracks".to_string(),
    })?;
    Ok(items
        .iter()
        .map(|item| match source {
            Some(entry_type) => {
                track_model::normalize(&track_model::tag_source(item.clone(), entry_type))
            }
            None => track_model::normalize(item),
        })
        .collect())
}

/// Keeps each entry unless the backend found a local file for it.
fn merge_local_matches(entries: &[TrackEntry], matches: &[Value]) -> Vec<TrackEntry> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let found = matches.get(index).filter(|candidate| {
                candidate
                    .get("path")
                    .and_then(Value::as_str)
                    .is_some_and(|path| !path.trim().is_empty())
            });
            match found {
                Some(candidate) => TrackEntry {
                    order: entry.order,
                    ..track_model::normalize(&track_model::tag_source(
                        candidate.clone(),
                        EntryType::MusicFile,
                    ))
                },
                None => entry.clone(),
            }
        })
        .collect()
}

fn read_json(url: &str, response: ureq::Response) -> Result<Value, BackendError> {
    response
        .into_json::<Value>()
        .map_err(|err| BackendError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
}

fn map_ureq_error(url: &str, err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, response) => BackendError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => BackendError::Http {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use super::{merge_local_matches, parse_playlist, query_string, HttpBackend};
    use crate::backends::{BackendError, LibraryBackend, PlaylistBackend};
    use crate::playlist::{EntryType, TrackDetails, TrackEntry};

    /// Serves one canned response per connection and records request lines.
    fn canned_server(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(&stream);
                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                recorded
                    .lock()
                    .expect("lock")
                    .push(request_line.trim_end().to_string());
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut writer = &stream;
                let _ = writer.write_all(reply.as_bytes());
                let _ = writer.flush();
            }
        });
        (format!("http://{address}"), requests)
    }

    fn backend(base_url: &str, page_size: usize) -> HttpBackend {
        HttpBackend::new(
            base_url,
            Duration::from_secs(2),
            Duration::from_secs(2),
            page_size,
        )
    }

    #[test]
    fn test_query_string_encodes_values() {
        assert_eq!(
            query_string(&[("query", "AC/DC & co".to_string()), ("limit", "5".to_string())]),
            "query=AC%2FDC%20%26%20co&limit=5"
        );
    }

    #[test]
    fn test_base_url_drops_trailing_slash() {
        assert_eq!(backend(" http://host:3000/ ", 10).base_url(), "http://host:3000");
    }

    #[test]
    fn test_parse_playlist_normalizes_rows() {
        let playlist = parse_playlist(
            "http://x",
            &json!({
                "id": 3,
                "name": "Mix",
                "entries": [
                    { "id": 10, "order": 0, "entry_type": "lastfm", "details": { "title": "T" }, "url": "https://last.fm/t" },
                ],
            }),
        )
        .expect("valid playlist");
        assert_eq!(playlist.id, Some(3));
        assert_eq!(playlist.entries[0].entry_type, EntryType::Lastfm);
        assert_eq!(playlist.entries[0].id, Some(10));

        assert!(matches!(
            parse_playlist("http://x", &json!([])),
            Err(BackendError::Decode { .. })
        ));
    }

    #[test]
    fn test_fetch_playlist_pages_until_count_and_sorts() {
        let (base_url, requests) = canned_server(vec![
            (200, json!({ "count": 3 }).to_string()),
            (
                200,
                json!({ "id": 7, "name": "Mix", "entries": [
                    { "order": 1, "details": { "title": "B" } },
                    { "order": 0, "details": { "title": "A" } },
                ]})
                .to_string(),
            ),
            (
                200,
                json!({ "id": 7, "name": "Mix", "entries": [
                    { "order": 5, "details": { "title": "C" } },
                ]})
                .to_string(),
            ),
        ]);

        let playlist = backend(&base_url, 2).fetch_playlist(7).expect("fetch");

        let titles: Vec<_> = playlist.entries.iter().filter_map(|entry| entry.title()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        let orders: Vec<_> = playlist.entries.iter().map(|entry| entry.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(playlist.name, "Mix");
        assert_eq!(
            *requests.lock().expect("lock"),
            vec![
                "GET /api/playlists/7/count HTTP/1.1".to_string(),
                "GET /api/playlists/7?limit=2&offset=0 HTTP/1.1".to_string(),
                "GET /api/playlists/7?limit=2&offset=2 HTTP/1.1".to_string(),
            ]
        );
    }

    #[test]
    fn test_error_status_is_reported_with_body() {
        let (base_url, _) = canned_server(vec![(500, "boom".to_string())]);
        match backend(&base_url, 10).export_m3u(1) {
            Err(BackendError::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_lastfm_track_tags_the_result() {
        let (base_url, requests) = canned_server(vec![
            (
                200,
                json!({ "title": "Lullaby", "artist": "Low", "url": "https://last.fm/low/lullaby" })
                    .to_string(),
            ),
            (200, json!([]).to_string()),
        ]);
        let backend = backend(&base_url, 10);

        let track = backend
            .lookup_lastfm_track("Lullaby", "Low")
            .expect("lookup");
        assert_eq!(track.entry_type, EntryType::Lastfm);
        assert_eq!(track.title(), Some("Lullaby"));
        assert_eq!(track.artist(), Some("Low"));
        assert_eq!(track.url.as_deref(), Some("https://last.fm/low/lullaby"));

        assert!(matches!(
            backend.lookup_lastfm_track("Nothing", "Nobody"),
            Err(BackendError::Decode { .. })
        ));
        assert_eq!(
            requests.lock().expect("lock")[0],
            "GET /api/lastfm?title=Lullaby&artist=Low HTTP/1.1"
        );
    }

    #[test]
    fn test_merge_local_matches_replaces_only_found_tracks() {
        let requested = |title: &str, order: usize| TrackEntry {
            order,
            details: TrackDetails {
                title: Some(title.to_string()),
                ..TrackDetails::default()
            },
            ..TrackEntry::default()
        };
        let entries = vec![requested("A", 0), requested("B", 1)];
        let merged = merge_local_matches(
            &entries,
            &[
                json!({ "id": 4, "title": "A", "path": "/a.flac" }),
                json!({ "title": "B", "path": null }),
            ],
        );

        assert_eq!(merged[0].entry_type, EntryType::MusicFile);
        assert_eq!(merged[0].music_file_id, Some(4));
        assert_eq!(merged[0].order, 0);
        assert_eq!(merged[1], entries[1]);
    }
}

use std::collections::BTreeSet;
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tracklist::backends::http_backend::HttpBackend;
use tracklist::backends::{clone_playlist, LibraryBackend, PlaylistBackend};
use tracklist::config::Config;
use tracklist::playlist::ordering::{SortColumn, SortDirection};
use tracklist::playlist::playlist_editor::{EditError, PlaylistEditor};
use tracklist::playlist::selection::Selection;
use tracklist::playlist::{FilterQuery, TrackEntry, UpdatePayload};
use tracklist::playlist_session::PlaylistSession;

use crate::repl;

#[derive(Parser, Debug)]
#[command(name = "tracklist")]
#[command(about = "Edit playlists on a self-hosted music server", long_about = None)]
pub struct Args {
    /// Server URL, overriding config.toml
    #[arg(long)]
    pub server: Option<String>,

    /// Alternate config file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List playlists
    List,
    /// Print a playlist's entries
    Show {
        id: i64,
        #[arg(long, value_enum, default_value_t = SortArg::Order)]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Only rows whose title, artist, album or type contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Create an empty playlist
    Create { name: String },
    Rename { id: i64, name: String },
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Copy a playlist under a new name
    Clone { id: i64, name: String },
    /// Search the library and append the best hit
    Add {
        id: i64,
        query: String,
        /// Append every hit instead of the first
        #[arg(long)]
        all: bool,
    },
    /// Remove entries by order
    Remove {
        id: i64,
        #[arg(required = true)]
        orders: Vec<usize>,
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Remove every entry from an album
    RemoveAlbum { id: i64, album: String },
    /// Remove every entry by an artist
    RemoveArtist { id: i64, artist: String },
    /// Move the entry at FROM so it lands at TO
    Move { id: i64, from: usize, to: usize },
    /// Swap entries for matching local library files
    Resolve { id: i64 },
    /// Download the playlist as M3U
    Export {
        id: i64,
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    SyncPlex { id: i64 },
    /// Rescan the music library
    Scan {
        #[arg(long)]
        full: bool,
    },
    Stats,
    /// Search the library
    Search {
        query: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Suggest tracks similar to one entry
    Similar {
        id: i64,
        order: usize,
        #[arg(long, value_enum, default_value_t = SourceArg::Lastfm)]
        source: SourceArg,
        /// Append the suggestions to the playlist
        #[arg(long)]
        add: bool,
    },
    /// Look up one track on Last.fm
    Lastfm {
        artist: String,
        title: String,
        /// Append the track to this playlist
        #[arg(long, value_name = "ID")]
        add: Option<i64>,
    },
    /// Interactive editing session
    Edit { id: i64 },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
    Order,
    Type,
    Artist,
    Title,
}

impl From<SortArg> for SortColumn {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Order => SortColumn::Order,
            SortArg::Type => SortColumn::Type,
            SortArg::Artist => SortColumn::Artist,
            SortArg::Title => SortColumn::Title,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    Lastfm,
    Openai,
}

type CliResult = Result<(), Box<dyn Error>>;

pub fn run(command: Command, config: &Config, backend: Arc<HttpBackend>) -> CliResult {
    match command {
        Command::List => {
            for playlist in backend.list_playlists()? {
                println!(
                    "{:>5}  {} ({} entries)",
                    playlist.id, playlist.name, playlist.entry_count
                );
            }
            Ok(())
        }
        Command::Show {
            id,
            sort,
            desc,
            filter,
        } => {
            let mut editor = PlaylistEditor::new(config.editor.history_limit);
            editor.load(backend.fetch_playlist(id)?);
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            apply_sort(&mut editor, sort.into(), direction);
            if let Some(filter) = filter {
                editor.set_filter(&filter);
            }
            println!("{}", editor.playlist().name);
            print_entries(&editor.view(), None);
            Ok(())
        }
        Command::Create { name } => {
            let id = backend.create_playlist(name.trim())?;
            println!("Created playlist {id}");
            Ok(())
        }
        Command::Rename { id, name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(EditError::EmptyName.into());
            }
            backend.rename_playlist(id, name)?;
            Ok(())
        }
        Command::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete playlist {id}?"))? {
                return Ok(());
            }
            backend.delete_playlist(id)?;
            info!("Deleted playlist {}", id);
            Ok(())
        }
        Command::Clone { id, name } => {
            let new_id = clone_playlist(backend.as_ref(), id, name.trim())?;
            println!("Created playlist {new_id}");
            Ok(())
        }
        Command::Add { id, query, all } => {
            let mut hits = backend.search_library(&query)?;
            if hits.is_empty() {
                println!("No library matches for '{query}'");
                return Ok(());
            }
            if !all {
                hits.truncate(1);
            }
            edit_playlist(config, &backend, id, |editor| Ok(editor.add_tracks(hits)))
        }
        Command::Remove { id, orders, yes } => {
            if orders.len() > 1
                && config.editor.confirm_bulk_remove
                && !yes
                && !confirm(&format!("Remove {} entries?", orders.len()))?
            {
                return Ok(());
            }
            let orders: BTreeSet<usize> = orders.into_iter().collect();
            edit_playlist(config, &backend, id, |editor| {
                Ok(editor.remove_orders(&orders))
            })
        }
        Command::RemoveAlbum { id, album } => edit_playlist(config, &backend, id, |editor| {
            Ok(editor.remove_by_album(&album))
        }),
        Command::RemoveArtist { id, artist } => edit_playlist(config, &backend, id, |editor| {
            Ok(editor.remove_by_artist(&artist))
        }),
        Command::Move { id, from, to } => {
            edit_playlist(config, &backend, id, |editor| editor.move_entry(from, to))
        }
        Command::Resolve { id } => {
            let playlist = backend.fetch_playlist(id)?;
            let resolved = backend.find_local_files(&playlist.entries)?;
            edit_playlist(config, &backend, id, |editor| Ok(editor.replace_with(resolved)))
        }
        Command::Export { id, output } => {
            let m3u = backend.export_m3u(id)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, m3u)?;
                    info!("Wrote {}", path.display());
                }
                None => print!("{m3u}"),
            }
            Ok(())
        }
        Command::SyncPlex { id } => {
            backend.sync_to_plex(id)?;
            info!("Playlist {} synced to Plex", id);
            Ok(())
        }
        Command::Scan { full } => {
            backend.scan(full)?;
            info!("{} scan started", if full { "Full" } else { "Quick" });
            Ok(())
        }
        Command::Stats => {
            let stats = backend.stats()?;
            let counters = [
                ("tracks", stats.total_tracks),
                ("artists", stats.total_artists),
                ("albums", stats.total_albums),
                ("playlists", stats.total_playlists),
            ];
            for (label, value) in counters {
                if let Some(value) = value {
                    println!("{label:<10} {value}");
                }
            }
            for (key, value) in &stats.extra {
                println!("{key:<10} {value}");
            }
            Ok(())
        }
        Command::Search {
            query,
            artist,
            album,
            title,
        } => {
            let hits = if artist.is_some() || album.is_some() || title.is_some() {
                backend.filter(&FilterQuery {
                    full_search: query,
                    artist,
                    album,
                    title,
                    limit: config.search.limit,
                })?
            } else {
                let query = query.unwrap_or_default();
                if query.trim().is_empty() {
                    return Err("nothing to search for".into());
                }
                backend.search_library(query.trim())?
            };
            let hits: Vec<&TrackEntry> = hits.iter().take(config.search.limit as usize).collect();
            print_entries(&hits, None);
            Ok(())
        }
        Command::Similar {
            id,
            order,
            source,
            add,
        } => {
            let playlist = backend.fetch_playlist(id)?;
            let seed = playlist
                .entries
                .get(order)
                .ok_or_else(|| format!("playlist {id} has no entry {order}"))?;
            let artist = seed.display_artist().unwrap_or_default();
            let title = seed.title().unwrap_or_default();
            let suggestions = match source {
                SourceArg::Lastfm => backend.similar_from_lastfm(artist, title)?,
                SourceArg::Openai => backend.similar_from_openai(artist, title)?,
            };
            print_entries(&suggestions.iter().collect::<Vec<_>>(), None);
            if add && !suggestions.is_empty() {
                return edit_playlist(config, &backend, id, |editor| {
                    Ok(editor.add_tracks(suggestions))
                });
            }
            Ok(())
        }
        Command::Lastfm { artist, title, add } => {
            let track = backend.lookup_lastfm_track(&title, &artist)?;
            print_entries(&[&track], None);
            if let Some(url) = &track.url {
                println!("      {url}");
            }
            match add {
                Some(id) => edit_playlist(config, &backend, id, |editor| {
                    Ok(editor.add_tracks(vec![track]))
                }),
                None => Ok(()),
            }
        }
        Command::Edit { id } => {
            let session =
                PlaylistSession::open(Arc::clone(&backend), id, config.editor.history_limit)?;
            repl::run(session, backend.as_ref(), config)
        }
    }
}

/// Applies one edit through a session and waits for the save.
fn edit_playlist<F>(config: &Config, backend: &Arc<HttpBackend>, id: i64, edit: F) -> CliResult
where
    F: FnOnce(&mut PlaylistEditor) -> Result<Option<UpdatePayload>, EditError>,
{
    let mut session = PlaylistSession::open(Arc::clone(backend), id, config.editor.history_limit)?;
    if !session.try_apply(edit)? {
        println!("Nothing changed.");
        return Ok(());
    }
    let timeout = Duration::from_secs(config.editor.save_timeout_secs);
    if !session.flush(timeout) {
        return Err("timed out waiting for the server to save the playlist".into());
    }
    if let Some(status) = session.editor().status() {
        return Err(status.to_string().into());
    }
    print_entries(&session.editor().view(), None);
    Ok(())
}

pub fn print_entries(entries: &[&TrackEntry], selection: Option<&Selection>) {
    for entry in entries {
        let marker = match selection {
            Some(selection) if selection.contains(entry.order) => "*",
            _ => " ",
        };
        let missing = if entry.missing { "  [missing]" } else { "" };
        println!(
            "{marker}{:>4}  {:<15} {}{missing}",
            entry.order,
            entry.entry_type.as_str(),
            entry.label()
        );
    }
}

/// `set_sort` flips the direction when the column is already active.
pub fn apply_sort(editor: &mut PlaylistEditor, column: SortColumn, direction: SortDirection) {
    for _ in 0..2 {
        if editor.sort() == (column, direction) {
            return;
        }
        editor.set_sort(column);
    }
}

pub fn sort_label(sort: (SortColumn, SortDirection)) -> String {
    let direction = match sort.1 {
        SortDirection::Ascending => "asc",
        SortDirection::Descending => "desc",
    };
    format!("{:?} {direction}", sort.0).to_lowercase()
}

pub fn confirm(prompt: &str) -> std::io::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

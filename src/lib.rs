//! Playlist editing core for a self-hosted music playlist server.
//!
//! [`playlist`] holds the data model together with the ordering engine,
//! selection tracker, undo history and the editor that combines them.
//! [`playlist_session`] adds optimistic persistence through a
//! [`backends::PlaylistBackend`].

pub mod backends;
pub mod config;
pub mod playlist;
pub mod playlist_session;
pub mod protocol;
pub mod search;
pub mod track_model;

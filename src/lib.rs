//! castsync - synced local and Chromecast playback for a media server
//!
//! Plays media from a companion media server either locally through mpv or on
//! a Chromecast through catt, merges both engines into one playback view,
//! keeps watch progress persisted server-side, and auto-continues series to
//! the next episode.
//!
//! # Modules
//!
//! - `models` - Sessions, events, receiver status, progress records
//! - `api` - Media server HTTP client
//! - `playback` - Local and remote adapters, state store, persistence, continuation
//! - `player` - The orchestrating event loop
//! - `config` - On-disk configuration

pub mod models;

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod playback;
pub mod player;

// Re-export commonly used types
pub use models::{
    Authority, CastDevice, EpisodeRef, MediaType, PlaybackSession, PlayerEvent, ProgressRecord,
    RemoteCastSession, RemotePlayerState, RemoteStatus, SessionPhase,
};

pub use api::{NetworkInfo, ServerClient, ServerError};
pub use player::{Player, PlayerOptions};

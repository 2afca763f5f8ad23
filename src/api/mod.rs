//! API clients
//!
//! REST client for the media-server backend (progress, next-episode,
//! network-info).

pub mod server;

pub use server::{NetworkInfo, ServerClient, ServerError};

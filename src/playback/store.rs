//! Playback state store
//!
//! Merges normalized events from whichever adapter currently holds authority
//! into one unified `PlaybackSession` view. Events from the non-authoritative
//! side are dropped, so a late local tick can never clobber remote state (or
//! vice versa).

use crate::models::{
    Authority, MediaType, PlaybackSession, PlayerEvent, RemotePlayerState, RemoteStatus,
};

/// Single source of truth for the merged "now playing" view
#[derive(Debug)]
pub struct PlaybackStateStore {
    session: PlaybackSession,
}

impl PlaybackStateStore {
    pub fn new(media_id: impl Into<String>, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            session: PlaybackSession::new(media_id, media_type, title),
        }
    }

    /// The merged session view
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn authority(&self) -> Authority {
        self.session.authority
    }

    /// Apply a normalized event from the local adapter. Ignored unless the
    /// local engine holds authority.
    pub fn apply_local_event(&mut self, event: &PlayerEvent) {
        if self.session.authority != Authority::Local {
            return;
        }

        match event {
            PlayerEvent::Started => self.session.is_playing = true,
            PlayerEvent::Paused | PlayerEvent::Stalled => self.session.is_playing = false,
            PlayerEvent::TimeUpdated { position, buffered } => {
                self.session.position = *position;
                self.session.buffered = *buffered;
            }
            PlayerEvent::MetadataLoaded { duration } => self.session.duration = *duration,
            PlayerEvent::Ended => {
                if self.session.duration > 0.0 {
                    self.session.position = self.session.duration;
                }
                self.session.is_playing = false;
            }
            PlayerEvent::Errored(_) => self.session.is_playing = false,
        }
    }

    /// Apply a polled receiver snapshot. Ignored unless the remote engine
    /// holds authority.
    pub fn apply_remote_status(&mut self, status: &RemoteStatus) {
        if self.session.authority != Authority::Remote {
            return;
        }

        // An idle receiver reports zeroed duration before anything loads;
        // keep the last known duration in that case.
        if status.duration > 0.0 {
            self.session.duration = status.duration;
            self.session.position = status.position;
        }
        self.session.is_playing = matches!(
            status.state,
            RemotePlayerState::Playing | RemotePlayerState::Buffering
        );
    }

    /// Switch the live authority. The outgoing authority's position carries
    /// over and `is_playing` is preserved so the view never shows a
    /// discontinuity. Returns the position the incoming authority should
    /// start from.
    pub fn set_authority(&mut self, authority: Authority) -> f64 {
        self.session.authority = authority;
        self.session.position
    }

    /// Point the view at a new media item (continuation handoff). Position
    /// and metadata reset; authority and playing state carry over.
    pub fn set_media(
        &mut self,
        media_id: impl Into<String>,
        media_type: MediaType,
        title: impl Into<String>,
    ) {
        self.session.media_id = media_id.into();
        self.session.media_type = media_type;
        self.session.title = title.into();
        self.session.position = 0.0;
        self.session.duration = 0.0;
        self.session.buffered = 0.0;
    }
}

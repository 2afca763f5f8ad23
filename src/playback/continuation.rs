//! Series auto-continuation
//!
//! Detects end-of-media from the merged session view, resolves the next
//! episode from the server, and guards the whole sequence with a trigger so
//! that repeated end observations (local event plus several poll ticks
//! reporting the same idle tail) advance at most once.

use crate::api::ServerClient;
use crate::models::{Authority, EpisodeRef, PlaybackSession, RemotePlayerState};

use std::time::Duration;

/// A receiver idling this close to the end counts as finished
pub const NEAR_END_WINDOW_SECS: f64 = 2.0;

/// Time based end detection requires at least this much playback first,
/// so a receiver still buffering at startup is never mistaken for finished
pub const MIN_ELAPSED_SECS: f64 = 10.0;

/// Settle delay between resolving the next episode and loading it, giving
/// the receiver time to tear down the finished stream
pub const HANDOFF_SETTLE: Duration = Duration::from_secs(2);

/// Why the engine considered the current item finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The authoritative adapter emitted an explicit end event
    EndedEvent,
    /// Remote receiver went idle with almost nothing left to play
    RemoteIdleNearEnd,
    /// Position reached the near-end window under sustained playback
    NearEndByTime,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::EndedEvent => write!(f, "ended event"),
            EndReason::RemoteIdleNearEnd => write!(f, "receiver idle near end"),
            EndReason::NearEndByTime => write!(f, "position reached end"),
        }
    }
}

/// Tracks which item an end-of-media has been handled for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationTrigger {
    pub media_id: String,
    pub armed: bool,
}

/// Per-playback continuation state. Each player run owns its own engine;
/// nothing here is shared across sessions.
#[derive(Debug, Default)]
pub struct ContinuationEngine {
    trigger: Option<ContinuationTrigger>,
    season: Option<u32>,
}

impl ContinuationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) -> Option<&ContinuationTrigger> {
        self.trigger.as_ref()
    }

    /// Record the season of the item currently playing, once known
    pub fn set_season(&mut self, season: u32) {
        self.season = Some(season);
    }

    /// Inspect the session view after each event or poll tick. Returns the
    /// end reason the first time the current item qualifies as finished;
    /// repeated calls while it stays finished return `None`.
    ///
    /// `ended_event` is true when the authoritative adapter delivered an
    /// explicit end event this tick. `elapsed_secs` is wall-clock time since
    /// this item started playing.
    pub fn observe(
        &mut self,
        view: &PlaybackSession,
        remote_state: Option<RemotePlayerState>,
        ended_event: bool,
        elapsed_secs: f64,
    ) -> Option<EndReason> {
        // Playback moved to something the trigger does not track
        let stale = self
            .trigger
            .as_ref()
            .is_some_and(|t| t.media_id != view.media_id);
        if stale {
            self.trigger = None;
        }

        let reason = self.qualify(view, remote_state, ended_event, elapsed_secs);

        let Some(reason) = reason else {
            // Back to normal playback away from the end: disarm so this
            // item's own end can fire later, but keep tracking it. Requiring
            // distance from the end keeps stale snapshots of a finished
            // stream from lifting the guard during a handoff.
            if let Some(t) = &mut self.trigger {
                if view.is_playing
                    && view.duration > 0.0
                    && view.remaining() > NEAR_END_WINDOW_SECS
                {
                    t.armed = false;
                }
            }
            return None;
        };

        // Already handled this item's end
        if matches!(&self.trigger, Some(t) if t.armed && t.media_id == view.media_id) {
            return None;
        }

        self.trigger = Some(ContinuationTrigger {
            media_id: view.media_id.clone(),
            armed: true,
        });
        Some(reason)
    }

    fn qualify(
        &self,
        view: &PlaybackSession,
        remote_state: Option<RemotePlayerState>,
        ended_event: bool,
        elapsed_secs: f64,
    ) -> Option<EndReason> {
        if !view.media_type.is_series() {
            return None;
        }

        if ended_event {
            return Some(EndReason::EndedEvent);
        }

        // Near-end checks need a real duration; an unloaded item reports zero
        if view.duration <= 0.0 {
            return None;
        }

        let near_end = view.remaining() <= NEAR_END_WINDOW_SECS;

        if view.authority == Authority::Remote
            && remote_state == Some(RemotePlayerState::Idle)
            && near_end
        {
            return Some(EndReason::RemoteIdleNearEnd);
        }

        // A bare idle state is not enough: receivers report idle while a
        // stream is still being set up
        if near_end && elapsed_secs > MIN_ELAPSED_SECS {
            return Some(EndReason::NearEndByTime);
        }

        None
    }

    /// Resolve the next episode for the item whose end fired. `None` means
    /// the series is finished, the item is standalone, or the lookup failed;
    /// the trigger is cleared in all of those cases so playback simply stops.
    pub async fn resolve_next(&mut self, client: &ServerClient) -> Option<EpisodeRef> {
        let media_id = self.trigger.as_ref()?.media_id.clone();

        match client.next_episode(&media_id).await {
            Ok(Some(next)) => Some(next),
            Ok(None) => {
                tracing::info!("no next episode after {}, series finished", media_id);
                self.trigger = None;
                None
            }
            Err(e) => {
                tracing::warn!("next episode lookup failed for {}: {}", media_id, e);
                self.trigger = None;
                None
            }
        }
    }

    /// Point the trigger at the next item after a successful handoff. It
    /// stays armed until the new item is observed playing, so stale end
    /// observations of the finished item cannot fire again, and notes season
    /// boundaries as they pass.
    pub fn advance_to(&mut self, next: &EpisodeRef) {
        if let Some(season) = self.season {
            if season != next.season_number {
                tracing::info!(
                    "crossing season boundary: S{:02} -> S{:02}",
                    season,
                    next.season_number
                );
            }
        }
        self.season = Some(next.season_number);
        self.trigger = Some(ContinuationTrigger {
            media_id: next.id.clone(),
            armed: true,
        });
    }

    pub fn clear(&mut self) {
        self.trigger = None;
    }
}

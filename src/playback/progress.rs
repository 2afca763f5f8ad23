//! Throttled progress persistence
//!
//! Saves are best effort: a failed POST is logged and swallowed, never
//! surfaced to playback.

use crate::api::{ServerClient, ServerError};
use crate::models::{MediaType, ProgressRecord};

use std::time::Duration;

/// Resume positions below this are treated as "start from the beginning"
pub const MIN_RESUME_SECS: f64 = 10.0;

/// Periodic save cadence while playing
pub const SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum position delta between consecutive saves driven by remote polling
pub const REMOTE_SAVE_DELTA_SECS: f64 = 5.0;

/// Persists playback progress for one media item at a throttled cadence
#[derive(Debug)]
pub struct ProgressTracker {
    client: ServerClient,
    media_type: MediaType,
    media_id: String,
    last_saved_position: Option<f64>,
}

impl ProgressTracker {
    pub fn new(client: ServerClient, media_type: MediaType, media_id: impl Into<String>) -> Self {
        Self {
            client,
            media_type,
            media_id: media_id.into(),
            last_saved_position: None,
        }
    }

    /// Fetch the saved resume position, if it is worth resuming from.
    /// Completed items and positions under the resume floor start over.
    /// Any fetch error degrades to "no resume".
    pub async fn load_resume(&self) -> Option<f64> {
        match self.client.load_progress(self.media_type, &self.media_id).await {
            Ok(Some(saved)) => {
                if saved.completed || saved.position < MIN_RESUME_SECS {
                    None
                } else {
                    Some(saved.position)
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("failed to load progress for {}: {}", self.media_id, e);
                None
            }
        }
    }

    /// Whether a poll-driven save at `position` clears the throttle delta
    pub fn should_save(&self, position: f64) -> bool {
        match self.last_saved_position {
            Some(last) => (position - last).abs() >= REMOTE_SAVE_DELTA_SECS,
            None => true,
        }
    }

    /// Save unconditionally (interval tick, pause, authority handoff)
    pub async fn save(&mut self, position: f64, duration: f64) {
        self.post(ProgressRecord::new(
            self.media_type,
            self.media_id.clone(),
            position,
            duration,
        ))
        .await;
    }

    /// Save only if the position has moved far enough since the last save.
    /// Used on remote status ticks, which arrive every second.
    pub async fn save_throttled(&mut self, position: f64, duration: f64) {
        if self.should_save(position) {
            self.save(position, duration).await;
        }
    }

    /// Final save at end of media, marked completed
    pub async fn save_completed(&mut self, duration: f64) {
        self.post(ProgressRecord::new(
            self.media_type,
            self.media_id.clone(),
            duration,
            duration,
        ))
        .await;
    }

    /// Re-point the tracker at a new item after a continuation handoff
    pub fn rebind(&mut self, media_type: MediaType, media_id: impl Into<String>) {
        self.media_type = media_type;
        self.media_id = media_id.into();
        self.last_saved_position = None;
    }

    async fn post(&mut self, record: ProgressRecord) {
        let position = record.position;
        match self.client.save_progress(&record).await {
            Ok(()) => {
                self.last_saved_position = Some(position);
                tracing::debug!(
                    "saved progress for {} at {:.1}s (completed: {})",
                    record.media_id,
                    position,
                    record.completed
                );
            }
            Err(ServerError::RequestFailed(e)) => {
                tracing::warn!("progress save failed for {}: {}", record.media_id, e);
            }
            Err(e) => {
                tracing::warn!("progress save rejected for {}: {}", record.media_id, e);
            }
        }
    }
}

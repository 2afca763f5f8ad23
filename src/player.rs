//! Playback orchestrator
//!
//! Owns both adapters, the merged state store, persistence and continuation,
//! and runs the single event loop that multiplexes local events, remote poll
//! snapshots and the periodic save tick.

use crate::api::ServerClient;
use crate::config::Config;
use crate::models::{
    Authority, EpisodeRef, MediaType, PlaybackSession, PlayerEvent, RemotePlayerState,
    RemoteStatus,
};
use crate::playback::continuation::{ContinuationEngine, HANDOFF_SETTLE, NEAR_END_WINDOW_SECS};
use crate::playback::progress::{ProgressTracker, SAVE_INTERVAL};
use crate::playback::{
    CattTransport, LocalMediaAdapter, PlaybackStateStore, RemoteSessionAdapter, StreamUrlResolver,
};

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// How a playback run should start
#[derive(Debug, Default)]
pub struct PlayerOptions {
    /// Resume from saved progress when a usable position exists
    pub resume: bool,
    /// Cast to this device instead of playing locally
    pub device: Option<String>,
}

/// One playback run: a media item, its state, and the adapters driving it
pub struct Player {
    store: PlaybackStateStore,
    tracker: ProgressTracker,
    engine: ContinuationEngine,
    client: ServerClient,
    resolver: StreamUrlResolver,
    local: LocalMediaAdapter,
    remote: Option<RemoteSessionAdapter>,
    local_events: Option<mpsc::UnboundedReceiver<PlayerEvent>>,
    remote_status: Option<watch::Receiver<Option<RemoteStatus>>>,
    catt_path: String,
    // Wall-clock start of the current item, for startup-buffering guards
    item_started: Instant,
}

enum Step {
    Local(Option<PlayerEvent>),
    Remote(Option<RemoteStatus>),
    RemoteClosed,
    Save,
}

impl Player {
    pub fn new(
        config: &Config,
        media_id: impl Into<String>,
        media_type: MediaType,
        title: impl Into<String>,
    ) -> Self {
        let media_id = media_id.into();
        let client = ServerClient::new(config.server_url());

        Self {
            store: PlaybackStateStore::new(&media_id, media_type, title),
            tracker: ProgressTracker::new(ServerClient::new(config.server_url()), media_type, &media_id),
            engine: ContinuationEngine::new(),
            client,
            resolver: StreamUrlResolver::new(
                ServerClient::new(config.server_url()),
                config.stream_port(),
            ),
            local: LocalMediaAdapter::new(config.mpv_path()),
            remote: None,
            local_events: None,
            remote_status: None,
            catt_path: config.catt_path(),
            item_started: Instant::now(),
        }
    }

    /// The merged "now playing" view
    pub fn session(&self) -> &PlaybackSession {
        self.store.session()
    }

    /// Play the media item to completion (including any series continuation),
    /// then return. Errors are unrecoverable playback failures; a finished
    /// series or movie is a normal return.
    pub async fn run(mut self, options: PlayerOptions) -> Result<()> {
        let resume = if options.resume {
            self.tracker.load_resume().await
        } else {
            None
        };
        let start_position = resume.unwrap_or(0.0);
        if let Some(pos) = resume {
            tracing::info!("resuming from {:.0}s", pos);
        }

        let media_id = self.store.session().media_id.clone();
        let title = self.store.session().title.clone();
        let url = self.resolver.resolve(&media_id).await;

        match &options.device {
            Some(device) => {
                let transport = Arc::new(CattTransport::new(&self.catt_path));
                let mut remote = RemoteSessionAdapter::new(transport, device);
                remote
                    .request_session()
                    .await
                    .with_context(|| format!("failed to reach device '{}'", device))?;
                remote
                    .load_media(&url, &title, start_position)
                    .await
                    .context("failed to start casting")?;
                self.store.set_authority(Authority::Remote);
                self.remote_status = Some(remote.subscribe());
                self.remote = Some(remote);
            }
            None => {
                let events = self
                    .local
                    .load(&url, start_position)
                    .await
                    .context("failed to start local playback")?;
                self.local_events = Some(events);
            }
        }

        self.item_started = Instant::now();
        let result = self.event_loop().await;

        // Always leave the receiver and mpv in a clean state
        if let Some(remote) = &mut self.remote {
            let _ = remote.end_session().await;
        }
        self.local.stop().await;
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut save_tick =
            tokio::time::interval_at(tokio::time::Instant::now() + SAVE_INTERVAL, SAVE_INTERVAL);
        save_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let step = {
                let local = &mut self.local_events;
                let remote = &mut self.remote_status;
                tokio::select! {
                    event = recv_local(local) => Step::Local(event),
                    step = next_remote(remote) => step,
                    _ = save_tick.tick() => Step::Save,
                }
            };

            let keep_running = match step {
                Step::Local(Some(event)) => self.on_local_event(event).await?,
                Step::Local(None) => {
                    // Event stream closed without an end event
                    tracing::debug!("local event stream closed");
                    false
                }
                Step::Remote(Some(status)) => self.on_remote_status(status).await?,
                Step::Remote(None) => true, // receiver unreachable this tick
                Step::RemoteClosed => {
                    // The poll task gives up after a sustained run of failed
                    // polls and closes the channel; the receiver is gone.
                    tracing::warn!("lost contact with the receiver, ending session");
                    let view = self.store.session();
                    if view.position > 0.0 {
                        let (pos, dur) = (view.position, view.duration);
                        self.tracker.save(pos, dur).await;
                    }
                    false
                }
                Step::Save => {
                    let view = self.store.session();
                    if view.is_playing {
                        let (pos, dur) = (view.position, view.duration);
                        self.tracker.save(pos, dur).await;
                    }
                    true
                }
            };

            if !keep_running {
                return Ok(());
            }
        }
    }

    async fn on_local_event(&mut self, event: PlayerEvent) -> Result<bool> {
        self.store.apply_local_event(&event);

        match event {
            PlayerEvent::Paused => {
                let view = self.store.session();
                let (pos, dur) = (view.position, view.duration);
                self.tracker.save(pos, dur).await;
                Ok(true)
            }
            PlayerEvent::Ended => {
                let view = self.store.session().clone();
                if !view.media_type.is_series() {
                    self.tracker.save_completed(view.duration.max(view.position)).await;
                    tracing::info!("'{}' finished", view.title);
                    return Ok(false);
                }
                self.check_continuation(None, true).await
            }
            PlayerEvent::Errored(msg) => {
                let view = self.store.session();
                let (pos, dur) = (view.position, view.duration);
                if pos > 0.0 {
                    self.tracker.save(pos, dur).await;
                }
                bail!("local playback failed: {}", msg);
            }
            PlayerEvent::TimeUpdated { .. } => self.check_continuation(None, false).await,
            PlayerEvent::Stalled => {
                tracing::debug!("local playback stalled on cache");
                Ok(true)
            }
            PlayerEvent::Started | PlayerEvent::MetadataLoaded { .. } => Ok(true),
        }
    }

    async fn on_remote_status(&mut self, status: RemoteStatus) -> Result<bool> {
        self.store.apply_remote_status(&status);
        let view = self.store.session().clone();

        if view.is_playing {
            self.tracker.save_throttled(view.position, view.duration).await;
        }

        if !view.media_type.is_series() {
            // Movies stop here; nothing to continue into
            let finished = view.duration > 0.0
                && status.state == RemotePlayerState::Idle
                && view.remaining() <= NEAR_END_WINDOW_SECS;
            if finished {
                self.tracker.save_completed(view.duration).await;
                tracing::info!("'{}' finished", view.title);
                return Ok(false);
            }
            return Ok(true);
        }

        self.check_continuation(Some(status.state), false).await
    }

    /// Feed the current view to the continuation engine; on a fresh end
    /// detection, persist completion and advance to the next episode.
    /// Returns false when playback is over.
    async fn check_continuation(
        &mut self,
        remote_state: Option<RemotePlayerState>,
        ended_event: bool,
    ) -> Result<bool> {
        let elapsed = self.item_started.elapsed().as_secs_f64();
        let view = self.store.session().clone();

        let Some(reason) = self.engine.observe(&view, remote_state, ended_event, elapsed)
        else {
            return Ok(true);
        };

        tracing::info!("'{}' finished ({})", view.title, reason);
        self.tracker
            .save_completed(view.duration.max(view.position))
            .await;

        let Some(next) = self.engine.resolve_next(&self.client).await else {
            return Ok(false);
        };
        self.advance(next).await
    }

    async fn advance(&mut self, next: EpisodeRef) -> Result<bool> {
        let url = self.resolver.resolve(&next.id).await;

        // Let the receiver finish tearing down the previous stream
        tokio::time::sleep(HANDOFF_SETTLE).await;
        tracing::info!("continuing with {}", next);

        match self.store.authority() {
            Authority::Remote => {
                let Some(remote) = self.remote.as_mut() else {
                    self.engine.clear();
                    return Ok(false);
                };
                if let Err(e) = remote.load_media(&url, &next.title, 0.0).await {
                    tracing::warn!("failed to cast next episode: {}", e);
                    self.engine.clear();
                    return Ok(false);
                }
            }
            Authority::Local => match self.local.load(&url, 0.0).await {
                Ok(events) => self.local_events = Some(events),
                Err(e) => {
                    tracing::warn!("failed to play next episode: {}", e);
                    self.engine.clear();
                    return Ok(false);
                }
            },
        }

        self.store.set_media(&next.id, MediaType::Episode, &next.title);
        self.tracker.rebind(MediaType::Episode, &next.id);
        self.engine.advance_to(&next);
        self.item_started = Instant::now();
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Control surface (routed by authority)
    // -------------------------------------------------------------------------

    pub async fn play(&mut self) -> Result<()> {
        match self.store.authority() {
            Authority::Local => self.local.play().await?,
            Authority::Remote => {
                if let Some(remote) = &self.remote {
                    remote.play().await?;
                }
            }
        }
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        match self.store.authority() {
            Authority::Local => self.local.pause().await?,
            Authority::Remote => {
                if let Some(remote) = &self.remote {
                    remote.pause().await?;
                }
            }
        }
        Ok(())
    }

    pub async fn seek(&mut self, position: f64) -> Result<()> {
        match self.store.authority() {
            Authority::Local => self.local.seek(position).await?,
            Authority::Remote => {
                if let Some(remote) = &self.remote {
                    remote.seek(position).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn set_volume(&mut self, volume: f32) -> Result<()> {
        match self.store.authority() {
            Authority::Local => self.local.set_volume(volume).await?,
            Authority::Remote => {
                if let Some(remote) = &mut self.remote {
                    remote.set_volume(volume).await?;
                }
            }
        }
        Ok(())
    }

    /// Hand playback to a cast device, carrying the current position over.
    /// Local playback is only torn down once the receiver has the stream, so
    /// a failed handoff leaves local playback running.
    pub async fn start_cast(&mut self, device: &str) -> Result<()> {
        let view = self.store.session().clone();
        let url = self.resolver.resolve(&view.media_id).await;

        let transport = Arc::new(CattTransport::new(&self.catt_path));
        let mut remote = RemoteSessionAdapter::new(transport, device);
        remote
            .request_session()
            .await
            .with_context(|| format!("failed to reach device '{}'", device))?;
        remote
            .load_media(&url, &view.title, view.position)
            .await
            .context("failed to hand playback to the receiver")?;

        self.local.stop().await;
        self.local_events = None;
        self.store.set_authority(Authority::Remote);
        self.remote_status = Some(remote.subscribe());
        self.remote = Some(remote);
        tracing::info!("playback handed to {} at {:.0}s", device, view.position);
        Ok(())
    }

    /// Bring playback back from the cast device to the local player
    pub async fn stop_cast(&mut self) -> Result<()> {
        let Some(mut remote) = self.remote.take() else {
            return Ok(());
        };
        self.remote_status = None;

        let position = self.store.set_authority(Authority::Local);
        let _ = remote.end_session().await;

        let media_id = self.store.session().media_id.clone();
        let url = self.resolver.resolve(&media_id).await;
        let events = self
            .local
            .load(&url, position)
            .await
            .context("failed to resume local playback")?;
        self.local_events = Some(events);
        tracing::info!("playback back on local player at {:.0}s", position);
        Ok(())
    }
}

async fn recv_local(
    rx: &mut Option<mpsc::UnboundedReceiver<PlayerEvent>>,
) -> Option<PlayerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_remote(rx: &mut Option<watch::Receiver<Option<RemoteStatus>>>) -> Step {
    match rx {
        Some(rx) => {
            if rx.changed().await.is_ok() {
                Step::Remote(rx.borrow_and_update().clone())
            } else {
                Step::RemoteClosed
            }
        }
        None => std::future::pending().await,
    }
}

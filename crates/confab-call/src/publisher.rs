//! The local membership state machine.
//!
//! Owns local track creation, publish/unpublish sequencing, and session
//! join/leave for this client. The machine is the cross-product of four
//! axes, each visible to the UI: transport (waiting/resolved), media
//! connection, tracks (waiting/creating/ready), and publish
//! (waiting/starting/publishing).
//!
//! External requests (`start_tracks`, `request_join_and_publish`,
//! `request_disconnect`) set remembered flags; the drive loop converges on
//! them in whatever order they arrive, so no request is lost to call
//! ordering. On transport change the previous publisher is torn down —
//! unpublish, then stop tracks, then best-effort session leave — strictly
//! before the next one starts, via [`Scope::reconcile`]. At most one
//! publisher touches the capture hardware at any time.
//!
//! Force-mute note: lifting a force-mute restores the construction-time
//! default device intent, not the intent active when the mute was
//! imposed. Surprising but intentional; see `force_mute_restores_default`.

use std::sync::{Arc, Mutex, PoisonError};

use confab_core::{
    Behavior, Cleanup, MediaConnectionState, PublishError, Scope, SessionStatus, Transport,
};
use tokio::sync::watch;

use crate::{
    connections::Connection,
    errors::ErrorSink,
    ports::{CallIntent, DevicePort, LocalTrack, SessionPort, TrackRequest},
};

/// Local device intent: which capture kinds the user wants enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIntent {
    /// Microphone enabled.
    pub audio_enabled: bool,
    /// Camera enabled.
    pub video_enabled: bool,
}

impl DeviceIntent {
    /// The protocol-level call intent this maps to.
    pub fn call_intent(self) -> CallIntent {
        if self.video_enabled { CallIntent::Video } else { CallIntent::Audio }
    }

    /// The track-creation request this maps to.
    pub fn track_request(self) -> TrackRequest {
        TrackRequest { audio: self.audio_enabled, video: self.video_enabled }
    }
}

/// Transport axis of the local member state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    /// No transport resolved yet.
    Waiting,
    /// Outgoing transport resolved.
    Resolved(Transport),
}

/// Track axis of the local member state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// User has not requested tracks.
    WaitingForUser,
    /// Track creation in flight.
    Creating,
    /// Tracks created and held.
    Ready,
}

/// Publish axis of the local member state.
///
/// Only leaves `WaitingForUser` once the connection is live and tracks
/// are ready; the machine never reports `Publishing` while the media
/// connection is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    /// Ready (or not yet able) but not publishing.
    WaitingForUser,
    /// Sequential publish in progress.
    Starting,
    /// All tracks published.
    Publishing,
}

/// Composite local member state exposed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMemberState {
    /// Transport axis.
    pub transport: TransportState,
    /// Media connection axis.
    pub connection: MediaConnectionState,
    /// Homeserver session axis.
    pub session: SessionStatus,
    /// Track axis.
    pub tracks: TrackState,
    /// Publish axis.
    pub publish: PublishState,
    /// True while the local screen share is published.
    pub screen_sharing: bool,
    /// True between losing the combined (session AND media) connected
    /// state and regaining it.
    pub reconnecting: bool,
}

impl Default for LocalMemberState {
    fn default() -> Self {
        Self {
            transport: TransportState::Waiting,
            connection: MediaConnectionState::Disconnected,
            session: SessionStatus::Disconnected,
            tracks: TrackState::WaitingForUser,
            publish: PublishState::WaitingForUser,
            screen_sharing: false,
            reconnecting: false,
        }
    }
}

/// The local membership: remembered user requests plus the active
/// publisher for the current transport.
pub struct LocalMembership {
    state: Behavior<LocalMemberState>,
    tracks_requested: Behavior<bool>,
    publish_requested: Behavior<bool>,
    screen_share_requested: Behavior<bool>,
    intent: Behavior<DeviceIntent>,
    default_intent: DeviceIntent,
}

impl LocalMembership {
    /// Start the local membership machine.
    ///
    /// `connection` carries the connection for the local member's resolved
    /// transport, or `None` while unresolved. Each change of connection
    /// tears the previous publisher fully down before the next begins.
    pub fn new(
        scope: &Scope,
        session: Arc<dyn SessionPort>,
        devices: Arc<dyn DevicePort>,
        connection: watch::Receiver<Option<Connection>>,
        default_intent: DeviceIntent,
        errors: ErrorSink,
    ) -> Self {
        let state = Behavior::new(LocalMemberState::default());
        let tracks_requested = Behavior::new(false);
        let publish_requested = Behavior::new(false);
        let screen_share_requested = Behavior::new(false);
        let intent = Behavior::new(default_intent);

        let ctx = PublisherContext {
            session,
            devices,
            state: state.clone(),
            tracks_requested: tracks_requested.clone(),
            publish_requested: publish_requested.clone(),
            screen_share_requested: screen_share_requested.clone(),
            intent: intent.clone(),
            errors,
        };

        let reconcile_scope = scope.clone();
        scope.reconcile(connection, move |conn: Option<Connection>| {
            let ctx = ctx.clone();
            let scope = reconcile_scope.clone();
            async move {
                match conn {
                    None => {
                        ctx.state.update(|s| {
                            s.transport = TransportState::Waiting;
                            s.connection = MediaConnectionState::Disconnected;
                            s.publish = PublishState::WaitingForUser;
                        });
                        None
                    },
                    Some(conn) => {
                        let publisher = Arc::new(Publisher::new(ctx, conn, scope.child()));
                        publisher.clone().start();
                        let cleanup: Cleanup = Box::pin(async move {
                            publisher.teardown().await;
                        });
                        Some(cleanup)
                    },
                }
            }
        });

        Self {
            state,
            tracks_requested,
            publish_requested,
            screen_share_requested,
            intent,
            default_intent,
        }
    }

    /// Request local track creation. Remembered until disconnect.
    pub fn start_tracks(&self) {
        self.tracks_requested.set_if_changed(true);
    }

    /// Request session join and publishing. Remembered: calling this
    /// before `start_tracks` or before a transport resolves loses nothing.
    pub fn request_join_and_publish(&self) {
        self.publish_requested.set_if_changed(true);
    }

    /// Withdraw all requests: unpublish, release tracks, leave session.
    pub fn request_disconnect(&self) {
        self.publish_requested.set_if_changed(false);
        self.screen_share_requested.set_if_changed(false);
        self.tracks_requested.set_if_changed(false);
    }

    /// Start or stop sharing the screen. Only takes effect while
    /// publishing; the request is remembered like the others.
    pub fn set_screen_share_enabled(&self, enabled: bool) {
        self.screen_share_requested.set_if_changed(enabled);
    }

    /// Whether a screen share is currently requested.
    pub fn screen_share_requested(&self) -> &Behavior<bool> {
        &self.screen_share_requested
    }

    /// Enable or disable the microphone intent.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.intent.update(|i| i.audio_enabled = enabled);
    }

    /// Enable or disable the camera intent.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.intent.update(|i| i.video_enabled = enabled);
    }

    /// Impose or lift a force-mute condition.
    ///
    /// Lifting restores the construction-time default intent, not the
    /// intent that was active when the mute was imposed.
    pub fn set_force_muted(&self, muted: bool) {
        if muted {
            self.intent.update(|i| i.audio_enabled = false);
        } else {
            self.intent.set(self.default_intent);
        }
    }

    /// Composite state for the UI.
    pub fn state(&self) -> &Behavior<LocalMemberState> {
        &self.state
    }

    /// Current device intent.
    pub fn intent(&self) -> &Behavior<DeviceIntent> {
        &self.intent
    }
}

/// Everything a publisher instance needs from the surrounding machine.
#[derive(Clone)]
struct PublisherContext {
    session: Arc<dyn SessionPort>,
    devices: Arc<dyn DevicePort>,
    state: Behavior<LocalMemberState>,
    tracks_requested: Behavior<bool>,
    publish_requested: Behavior<bool>,
    screen_share_requested: Behavior<bool>,
    intent: Behavior<DeviceIntent>,
    errors: ErrorSink,
}

#[derive(Default)]
struct PublisherInner {
    tracks: Vec<Arc<dyn LocalTrack>>,
    published: Vec<String>,
    screen_track: Option<Arc<dyn LocalTrack>>,
    screen_published: bool,
    screen_failed: bool,
    joined: bool,
    join_failed: bool,
    publish_failed: bool,
    paused: bool,
    ever_combined: bool,
    last_intent_push: Option<CallIntent>,
    last_track_attempt: Option<TrackRequest>,
    torn_down: bool,
}

/// One publisher bound to one connection. Exclusive owner of the capture
/// hardware for its lifetime.
struct Publisher {
    ctx: PublisherContext,
    connection: Connection,
    scope: Scope,
    inner: Mutex<PublisherInner>,
}

impl Publisher {
    fn new(ctx: PublisherContext, connection: Connection, scope: Scope) -> Self {
        ctx.state.update(|s| {
            s.transport = TransportState::Resolved(connection.transport().clone());
        });
        Self { ctx, connection, scope, inner: Mutex::new(PublisherInner::default()) }
    }

    fn start(self: Arc<Self>) {
        let scope = self.scope.clone();
        scope.spawn(async move { self.drive().await });
    }

    /// Single serialized loop: snapshot inputs, converge one step, wait
    /// for any input to change. All device and room calls happen here or
    /// in `teardown`, never concurrently.
    async fn drive(self: Arc<Self>) {
        let mut tracks_rx = self.ctx.tracks_requested.watch();
        let mut publish_rx = self.ctx.publish_requested.watch();
        let mut screen_rx = self.ctx.screen_share_requested.watch();
        let mut intent_rx = self.ctx.intent.watch();
        let mut conn_rx = self.connection.state();
        let mut session_rx = self.ctx.session.status();

        loop {
            let want_tracks = *tracks_rx.borrow_and_update();
            let want_publish = *publish_rx.borrow_and_update();
            let want_screen = *screen_rx.borrow_and_update();
            let intent = *intent_rx.borrow_and_update();
            let conn_state = *conn_rx.borrow_and_update();
            let session_state = *session_rx.borrow_and_update();

            self.step(want_tracks, want_publish, want_screen, intent, conn_state, session_state)
                .await;

            tokio::select! {
                changed = tracks_rx.changed() => if changed.is_err() { break },
                changed = publish_rx.changed() => if changed.is_err() { break },
                changed = screen_rx.changed() => if changed.is_err() { break },
                changed = intent_rx.changed() => if changed.is_err() { break },
                changed = conn_rx.changed() => if changed.is_err() { break },
                changed = session_rx.changed() => if changed.is_err() { break },
            }
        }
    }

    async fn step(
        &self,
        want_tracks: bool,
        want_publish: bool,
        want_screen: bool,
        intent: DeviceIntent,
        conn_state: MediaConnectionState,
        session_state: SessionStatus,
    ) {
        if self.lock().torn_down {
            return;
        }

        self.sync_session(want_publish, session_state, intent).await;
        self.sync_tracks(want_tracks, intent).await;
        self.sync_publish(want_publish, conn_state).await;
        self.sync_screen_share(want_screen, want_publish, conn_state).await;
        self.sync_pause(conn_state, session_state).await;
        self.publish_state(conn_state, session_state, want_publish);
    }

    async fn sync_session(
        &self,
        want_join: bool,
        session_state: SessionStatus,
        intent: DeviceIntent,
    ) {
        let should_join = {
            let inner = self.lock();
            want_join && !inner.joined && !inner.join_failed
        };
        if should_join {
            match self.ctx.session.join(self.connection.transport()).await {
                Ok(()) => {
                    self.lock().joined = true;
                },
                Err(e) => {
                    self.lock().join_failed = true;
                    self.ctx.errors.record(e.into());
                },
            }
        }

        let should_leave = {
            let inner = self.lock();
            !want_join && inner.joined
        };
        if should_leave {
            self.lock().joined = false;
            if let Err(e) = self.ctx.session.leave().await {
                // Best-effort: the user asked to go, the session state will
                // expire server-side regardless.
                tracing::warn!(error = %e, "session leave failed");
            }
        }

        // Push call intent whenever the homeserver connection is live and
        // the declared intent is out of date.
        if session_state.is_connected() {
            let next = intent.call_intent();
            let stale = self.lock().last_intent_push != Some(next);
            if stale {
                match self.ctx.session.update_call_intent(next).await {
                    Ok(()) => self.lock().last_intent_push = Some(next),
                    Err(e) => tracing::warn!(error = %e, "call intent update failed"),
                }
            }
        }
    }

    async fn sync_tracks(&self, want_tracks: bool, intent: DeviceIntent) {
        if want_tracks {
            let request = intent.track_request();
            let should_create = {
                let inner = self.lock();
                inner.tracks.is_empty() && inner.last_track_attempt != Some(request)
            };
            if !should_create {
                return;
            }
            self.lock().last_track_attempt = Some(request);

            if request.is_empty() {
                // Creating zero tracks is an invariant violation, not a
                // silent no-op.
                self.ctx.errors.record(PublishError::NoTracksRequested.into());
                return;
            }

            self.ctx.state.update(|s| s.tracks = TrackState::Creating);
            match self.ctx.devices.create_tracks(request).await {
                Ok(tracks) => {
                    tracing::info!(count = tracks.len(), "local tracks created");
                    self.lock().tracks = tracks;
                    self.ctx.state.update(|s| s.tracks = TrackState::Ready);
                },
                Err(e) => {
                    self.ctx.errors.record(PublishError::TrackCreation(e.to_string()).into());
                    self.ctx.state.update(|s| s.tracks = TrackState::WaitingForUser);
                },
            }
        } else {
            let tracks = {
                let mut inner = self.lock();
                inner.last_track_attempt = None;
                if inner.tracks.is_empty() {
                    return;
                }
                self.release_for_stop(&mut inner)
            };
            self.unpublish_and_stop(tracks).await;
            self.ctx.state.update(|s| s.tracks = TrackState::WaitingForUser);
        }
    }

    async fn sync_publish(&self, want_publish: bool, conn_state: MediaConnectionState) {
        if want_publish {
            let pending: Vec<Arc<dyn LocalTrack>> = {
                let inner = self.lock();
                if inner.tracks.is_empty()
                    || inner.publish_failed
                    || !conn_state.is_connected()
                    || inner.published.len() == inner.tracks.len()
                {
                    return;
                }
                inner
                    .tracks
                    .iter()
                    .filter(|t| !inner.published.contains(&t.id().to_string()))
                    .cloned()
                    .collect()
            };

            // Sequential, stop on first failure: a partial publish is
            // surfaced, not papered over with retries of the remainder.
            for track in pending {
                let id = track.id().to_string();
                match self.connection.room().publish(track).await {
                    Ok(()) => self.lock().published.push(id),
                    Err(e) => {
                        self.lock().publish_failed = true;
                        self.ctx.errors.record(
                            PublishError::TrackPublish { track: id, reason: e.to_string() }.into(),
                        );
                        break;
                    },
                }
            }
        } else {
            let published = {
                let mut inner = self.lock();
                inner.publish_failed = false;
                std::mem::take(&mut inner.published)
            };
            for id in published {
                if let Err(e) = self.connection.room().unpublish(&id).await {
                    tracing::warn!(track = %id, error = %e, "unpublish failed");
                }
            }
        }
    }

    async fn sync_screen_share(
        &self,
        want_screen: bool,
        want_publish: bool,
        conn_state: MediaConnectionState,
    ) {
        // A screen share only makes sense while the member is publishing.
        if want_screen && want_publish && conn_state.is_connected() {
            let should_create = {
                let inner = self.lock();
                inner.screen_track.is_none() && !inner.screen_failed
            };
            if should_create {
                match self.ctx.devices.create_screen_share().await {
                    Ok(track) => {
                        self.lock().screen_track = Some(track);
                    },
                    Err(e) => {
                        self.lock().screen_failed = true;
                        self.ctx.errors.record(PublishError::TrackCreation(e.to_string()).into());
                    },
                }
            }

            let to_publish = {
                let inner = self.lock();
                if inner.screen_published { None } else { inner.screen_track.clone() }
            };
            if let Some(track) = to_publish {
                let id = track.id().to_string();
                match self.connection.room().publish(track).await {
                    Ok(()) => self.lock().screen_published = true,
                    Err(e) => {
                        self.lock().screen_failed = true;
                        self.ctx.errors.record(
                            PublishError::TrackPublish { track: id, reason: e.to_string() }.into(),
                        );
                    },
                }
            }
        } else if !want_screen {
            let released = {
                let mut inner = self.lock();
                inner.screen_failed = false;
                let Some(track) = inner.screen_track.take() else { return };
                let published = if inner.screen_published {
                    vec![track.id().to_string()]
                } else {
                    Vec::new()
                };
                inner.screen_published = false;
                ReleasedTracks { published, tracks: vec![track] }
            };
            self.unpublish_and_stop(released).await;
        }
    }

    async fn sync_pause(&self, conn_state: MediaConnectionState, session_state: SessionStatus) {
        let combined = conn_state.is_connected() && session_state.is_connected();
        if combined {
            self.lock().ever_combined = true;
        }

        let (change, tracks) = {
            let mut inner = self.lock();
            if inner.paused == !combined || inner.tracks.is_empty() {
                (None, Vec::new())
            } else {
                inner.paused = !combined;
                (Some(!combined), inner.tracks.clone())
            }
        };
        // Only touch the devices on an actual edge; redundant pause and
        // resume calls are suppressed.
        if let Some(paused) = change {
            for track in tracks {
                if let Err(e) = track.set_paused(paused).await {
                    tracing::warn!(track = %track.id(), error = %e, "pause state change failed");
                }
            }
        }
    }

    fn publish_state(
        &self,
        conn_state: MediaConnectionState,
        session_state: SessionStatus,
        want_publish: bool,
    ) {
        let inner = self.lock();
        let ready = !inner.tracks.is_empty();
        let publish = if want_publish && ready && conn_state.is_connected() {
            if inner.published.len() == inner.tracks.len() {
                PublishState::Publishing
            } else {
                PublishState::Starting
            }
        } else {
            PublishState::WaitingForUser
        };
        let combined = conn_state.is_connected() && session_state.is_connected();
        let reconnecting = inner.ever_combined && !combined;
        let screen_sharing = inner.screen_published;
        drop(inner);

        self.ctx.state.update(|s| {
            s.connection = conn_state;
            s.session = session_state;
            s.publish = publish;
            s.screen_sharing = screen_sharing;
            s.reconnecting = reconnecting;
        });
    }

    /// Full teardown: unpublish, stop tracks, best-effort session leave.
    /// Idempotent; always releases everything regardless of sub-state.
    async fn teardown(&self) {
        let (tracks, joined) = {
            let mut inner = self.lock();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            let joined = inner.joined;
            inner.joined = false;
            (self.release_for_stop(&mut inner), joined)
        };
        self.scope.end();

        self.unpublish_and_stop(tracks).await;
        if joined {
            if let Err(e) = self.ctx.session.leave().await {
                tracing::warn!(error = %e, "session leave failed during teardown");
            }
        }

        self.ctx.state.update(|s| {
            s.tracks = TrackState::WaitingForUser;
            s.publish = PublishState::WaitingForUser;
            s.screen_sharing = false;
            s.reconnecting = false;
        });
    }

    /// Take tracks and published ids out of the inner state for stopping.
    /// Includes the screen-share track, when one is live.
    fn release_for_stop(&self, inner: &mut PublisherInner) -> ReleasedTracks {
        let mut published = std::mem::take(&mut inner.published);
        let mut tracks = std::mem::take(&mut inner.tracks);
        if let Some(screen) = inner.screen_track.take() {
            if inner.screen_published {
                published.push(screen.id().to_string());
            }
            inner.screen_published = false;
            tracks.push(screen);
        }
        ReleasedTracks { published, tracks }
    }

    /// Unpublish first, then stop. Errors are logged; the hardware is
    /// released no matter what.
    async fn unpublish_and_stop(&self, released: ReleasedTracks) {
        for id in released.published {
            if let Err(e) = self.connection.room().unpublish(&id).await {
                tracing::warn!(track = %id, error = %e, "unpublish failed");
            }
        }
        for track in released.tracks {
            track.stop().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PublisherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct ReleasedTracks {
    published: Vec<String>,
    tracks: Vec<Arc<dyn LocalTrack>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_waits_on_every_axis() {
        let state = LocalMemberState::default();
        assert_eq!(state.transport, TransportState::Waiting);
        assert_eq!(state.tracks, TrackState::WaitingForUser);
        assert_eq!(state.publish, PublishState::WaitingForUser);
        assert!(!state.reconnecting);
    }

    #[test]
    fn device_intent_maps_to_call_intent() {
        let video = DeviceIntent { audio_enabled: true, video_enabled: true };
        let audio = DeviceIntent { audio_enabled: true, video_enabled: false };
        assert_eq!(video.call_intent(), CallIntent::Video);
        assert_eq!(audio.call_intent(), CallIntent::Audio);
    }

    #[test]
    fn empty_track_request_is_detected() {
        let none = DeviceIntent { audio_enabled: false, video_enabled: false };
        assert!(none.track_request().is_empty());
        let audio = DeviceIntent { audio_enabled: true, video_enabled: false };
        assert!(!audio.track_request().is_empty());
    }
}

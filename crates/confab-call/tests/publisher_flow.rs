//! End-to-end publisher behavior against scripted ports.

#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use confab_call::{
    ConnectionManager, DeviceIntent, ErrorSink, LocalMembership, PublishState, TrackState,
    ports::{DevicePort, MediaConnector, SessionPort, SfuAuthPort},
};
use confab_core::{
    CallError, MediaConnectionState, MediaError, PublishError, Scope, SessionError, SessionStatus,
    Transport,
};
use confab_harness::{
    EventLog, RecordingDevices, ScriptedMedia, ScriptedSession, StaticAuth, test_transport,
};
use tokio::sync::watch;

struct Rig {
    scope: Scope,
    log: EventLog,
    session: Arc<ScriptedSession>,
    devices: Arc<RecordingDevices>,
    media: Arc<ScriptedMedia>,
    auth: Arc<StaticAuth>,
    errors: ErrorSink,
    manager: ConnectionManager,
    required: watch::Sender<Vec<Transport>>,
    membership: LocalMembership,
}

/// Wire a connection manager and local membership against scripted fakes.
/// The membership binds to the first live connection, like the view model
/// does for the local transport.
fn rig(default_intent: DeviceIntent) -> Rig {
    let scope = Scope::new();
    let log = EventLog::new();
    let session = Arc::new(ScriptedSession::new(log.clone()));
    let devices = Arc::new(RecordingDevices::new(log.clone()));
    let media = Arc::new(ScriptedMedia::new(log.clone()));
    let auth = Arc::new(StaticAuth::new(log.clone()));
    let errors = ErrorSink::new();

    let (required, required_rx) = watch::channel(Vec::new());
    let manager = ConnectionManager::new(
        &scope,
        Arc::clone(&media) as Arc<dyn MediaConnector>,
        Arc::clone(&auth) as Arc<dyn SfuAuthPort>,
        required_rx,
        errors.clone(),
    );
    let local_conn = scope.derive(manager.connections(), |conns| conns.first().cloned());
    let membership = LocalMembership::new(
        &scope,
        Arc::clone(&session) as Arc<dyn SessionPort>,
        Arc::clone(&devices) as Arc<dyn DevicePort>,
        local_conn.watch(),
        default_intent,
        errors.clone(),
    );

    Rig { scope, log, session, devices, media, auth, errors, manager, required, membership }
}

fn audio_video() -> DeviceIntent {
    DeviceIntent { audio_enabled: true, video_enabled: true }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(start_paused = true)]
async fn join_request_before_tracks_is_remembered() {
    let r = rig(audio_video());

    // Join requested before tracks exist and before any transport: nothing
    // can happen yet, and nothing is lost.
    r.membership.request_join_and_publish();
    settle().await;
    assert!(r.log.entries_with_prefix("devices.create").is_empty());
    assert_eq!(r.membership.state().get().publish, PublishState::WaitingForUser);

    let t1 = test_transport("https://sfu-a.example.org");
    r.membership.start_tracks();
    r.session.set_status(SessionStatus::Connected);
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    assert_eq!(r.auth.calls(), 1);
    assert_eq!(r.manager.connections().get().len(), 1);
    assert_eq!(r.log.entries_with_prefix("devices.create").len(), 1);
    assert_eq!(r.log.entries_with_prefix("session.join").len(), 1);
    assert_eq!(r.log.entries_with_prefix("room.publish").len(), 2);

    let state = r.membership.state().get();
    assert_eq!(state.tracks, TrackState::Ready);
    assert_eq!(state.publish, PublishState::Publishing);
}

#[tokio::test(start_paused = true)]
async fn transport_switch_tears_down_before_next_publisher() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");
    let t2 = test_transport("https://sfu-b.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;
    assert_eq!(r.membership.state().get().publish, PublishState::Publishing);

    r.log.clear();
    r.required.send(vec![t2.clone()]).expect("receiver alive");
    settle().await;

    // Old tracks are unpublished and stopped, and the session left, before
    // the replacement publisher touches the devices again.
    let unpublish = r.log.position(&format!("room.unpublish {t1} audio-0")).expect("unpublished");
    let stop = r.log.position("track.stop video-0").expect("stopped");
    let leave = r.log.position("session.leave").expect("left");
    let recreate =
        r.log.position("devices.create audio=true video=true").expect("recreated tracks");
    let rejoin = r.log.position(&format!("session.join {t2}")).expect("rejoined");

    assert!(unpublish < stop);
    assert!(stop < recreate);
    assert!(leave < rejoin);

    // The new publisher converges back to publishing on the new transport.
    assert_eq!(r.membership.state().get().publish, PublishState::Publishing);
    let room = r.media.room_for(&t2).expect("room on new transport");
    assert_eq!(room.published().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn media_loss_pauses_tracks_until_reconnected() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    let room = r.media.room_for(&t1).expect("room connected");
    r.log.clear();

    room.set_state(MediaConnectionState::Disconnected);
    settle().await;
    assert!(r.membership.state().get().reconnecting);
    assert!(r.devices.created().iter().all(|t| t.is_paused()));

    room.set_state(MediaConnectionState::Connected);
    settle().await;
    assert!(!r.membership.state().get().reconnecting);
    assert!(r.devices.created().iter().all(|t| !t.is_paused()));

    // One pause and one resume per track; redundant edges are suppressed.
    let audio_pauses: Vec<String> = r.log.entries_with_prefix("track.pause audio-0");
    assert_eq!(audio_pauses, vec!["track.pause audio-0 true", "track.pause audio-0 false"]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_unpublishes_stops_and_leaves() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    r.log.clear();
    r.membership.request_disconnect();
    settle().await;

    assert_eq!(r.log.entries_with_prefix("room.unpublish").len(), 2);
    assert_eq!(r.log.entries_with_prefix("track.stop").len(), 2);
    assert_eq!(r.log.entries_with_prefix("session.leave").len(), 1);

    let state = r.membership.state().get();
    assert_eq!(state.tracks, TrackState::WaitingForUser);
    assert_eq!(state.publish, PublishState::WaitingForUser);

    let room = r.media.room_for(&t1).expect("room still live");
    assert!(room.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn all_kinds_disabled_is_a_soft_error() {
    let r = rig(DeviceIntent { audio_enabled: false, video_enabled: false });
    let t1 = test_transport("https://sfu-a.example.org");

    r.required.send(vec![t1]).expect("receiver alive");
    r.membership.start_tracks();
    settle().await;

    assert!(r.log.entries_with_prefix("devices.create").is_empty());
    assert_eq!(
        r.errors.soft().get(),
        Some(CallError::Publish(PublishError::NoTracksRequested))
    );
    assert_eq!(r.errors.fatal().get(), None);
}

#[tokio::test(start_paused = true)]
async fn publish_failure_stops_at_the_first_track() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    let room = r.media.room_for(&t1).expect("room connected");
    room.fail_next_publish(MediaError::ConnectionLost("net".into()));

    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    settle().await;

    // The audio publish fails; the video track is never attempted.
    assert!(r.log.position(&format!("room.publish failed {t1} audio-0")).is_some());
    assert!(r.log.position(&format!("room.publish {t1} video-0")).is_none());
    assert!(room.published().is_empty());

    assert_eq!(
        r.errors.soft().get(),
        Some(CallError::Publish(PublishError::TrackPublish {
            track: "audio-0".into(),
            reason: "media connection lost: net".into(),
        }))
    );
    assert_eq!(r.errors.fatal().get(), None);

    // The state never claims a publish that did not happen.
    assert_eq!(r.membership.state().get().publish, PublishState::Starting);
}

#[tokio::test(start_paused = true)]
async fn join_failure_latches_a_fatal_error() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.fail_next_join(SessionError::JoinFailed("auth".into()));
    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    assert_eq!(r.log.entries_with_prefix("session.join failed").len(), 1);
    assert!(r.log.position(&format!("session.join {t1}")).is_none());
    assert_eq!(
        r.errors.fatal().get(),
        Some(CallError::Session(SessionError::JoinFailed("auth".into())))
    );
}

#[tokio::test(start_paused = true)]
async fn track_creation_failure_is_soft() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.devices.fail_next_create(MediaError::DeviceFailed("camera".into()));
    r.required.send(vec![t1]).expect("receiver alive");
    r.membership.start_tracks();
    settle().await;

    assert!(r.devices.created().is_empty());
    assert_eq!(
        r.errors.soft().get(),
        Some(CallError::Publish(PublishError::TrackCreation(
            "device access failed: camera".into()
        )))
    );
    assert_eq!(r.errors.fatal().get(), None);
    assert_eq!(r.membership.state().get().tracks, TrackState::WaitingForUser);
}

#[tokio::test(start_paused = true)]
async fn screen_share_toggle_publishes_and_releases() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1.clone()]).expect("receiver alive");
    settle().await;

    r.membership.set_screen_share_enabled(true);
    settle().await;

    assert_eq!(r.log.entries_with_prefix("devices.screenshare").len(), 1);
    assert!(r.membership.state().get().screen_sharing);
    let room = r.media.room_for(&t1).expect("room connected");
    assert!(room.published().iter().any(|id| id.starts_with("screen-")));

    r.membership.set_screen_share_enabled(false);
    settle().await;

    assert!(!r.membership.state().get().screen_sharing);
    assert!(!room.published().iter().any(|id| id.starts_with("screen-")));
    assert!(r.log.position("track.stop screen-2").is_some());
}

#[tokio::test(start_paused = true)]
async fn ending_the_scope_releases_the_hardware() {
    let r = rig(audio_video());
    let t1 = test_transport("https://sfu-a.example.org");

    r.session.set_status(SessionStatus::Connected);
    r.membership.start_tracks();
    r.membership.request_join_and_publish();
    r.required.send(vec![t1]).expect("receiver alive");
    settle().await;

    r.scope.end();
    settle().await;

    assert!(r.devices.created().iter().all(|t| t.is_stopped()));
}

#[tokio::test(start_paused = true)]
async fn lifting_force_mute_restores_the_default_intent() {
    let default = DeviceIntent { audio_enabled: true, video_enabled: false };
    let r = rig(default);

    // The user turned audio off themselves before the moderator muted.
    r.membership.set_audio_enabled(false);
    r.membership.set_force_muted(true);
    assert!(!r.membership.intent().get().audio_enabled);

    // Lifting restores the construction-time default, not the pre-mute
    // user state.
    r.membership.set_force_muted(false);
    assert_eq!(r.membership.intent().get(), default);
}

//! Recording capture-device fakes.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use confab_call::ports::{DevicePort, LocalTrack, TrackKind, TrackRequest};
use confab_core::MediaError;

use crate::log::EventLog;

/// A [`LocalTrack`] recording pause/stop calls.
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    log: EventLog,
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    /// A track with the given id and kind.
    pub fn new(id: impl Into<String>, kind: TrackKind, log: EventLog) -> Self {
        Self {
            id: id.into(),
            kind,
            log,
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Whether the track is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Whether the track has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    async fn set_paused(&self, paused: bool) -> Result<(), MediaError> {
        self.paused.store(paused, Ordering::SeqCst);
        self.log.record(format!("track.pause {} {paused}", self.id));
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.log.record(format!("track.stop {}", self.id));
    }
}

/// A [`DevicePort`] that hands out [`FakeTrack`]s and retains them.
pub struct RecordingDevices {
    log: EventLog,
    created: Mutex<Vec<Arc<FakeTrack>>>,
    fail_create: Mutex<Option<MediaError>>,
}

impl RecordingDevices {
    /// Fresh device port.
    pub fn new(log: EventLog) -> Self {
        Self { log, created: Mutex::new(Vec::new()), fail_create: Mutex::new(None) }
    }

    /// Every track created so far.
    pub fn created(&self) -> Vec<Arc<FakeTrack>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make the next `create_tracks` fail with `error`.
    pub fn fail_next_create(&self, error: MediaError) {
        *self.fail_create.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl DevicePort for RecordingDevices {
    async fn create_tracks(
        &self,
        request: TrackRequest,
    ) -> Result<Vec<Arc<dyn LocalTrack>>, MediaError> {
        if let Some(error) = self.fail_create.lock().unwrap_or_else(PoisonError::into_inner).take()
        {
            self.log.record("devices.create failed");
            return Err(error);
        }
        self.log
            .record(format!("devices.create audio={} video={}", request.audio, request.video));

        let mut tracks: Vec<Arc<FakeTrack>> = Vec::new();
        let serial = self.created.lock().unwrap_or_else(PoisonError::into_inner).len();
        if request.audio {
            tracks.push(Arc::new(FakeTrack::new(
                format!("audio-{serial}"),
                TrackKind::Audio,
                self.log.clone(),
            )));
        }
        if request.video {
            tracks.push(Arc::new(FakeTrack::new(
                format!("video-{serial}"),
                TrackKind::Video,
                self.log.clone(),
            )));
        }
        self.created.lock().unwrap_or_else(PoisonError::into_inner).extend(tracks.iter().cloned());
        Ok(tracks.into_iter().map(|t| t as Arc<dyn LocalTrack>).collect())
    }

    async fn create_screen_share(&self) -> Result<Arc<dyn LocalTrack>, MediaError> {
        if let Some(error) = self.fail_create.lock().unwrap_or_else(PoisonError::into_inner).take()
        {
            self.log.record("devices.screenshare failed");
            return Err(error);
        }
        self.log.record("devices.screenshare");

        let serial = self.created.lock().unwrap_or_else(PoisonError::into_inner).len();
        let track = Arc::new(FakeTrack::new(
            format!("screen-{serial}"),
            TrackKind::ScreenShare,
            self.log.clone(),
        ));
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&track));
        Ok(track as Arc<dyn LocalTrack>)
    }
}

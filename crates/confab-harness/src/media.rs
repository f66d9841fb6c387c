//! Scripted media connector and rooms.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use confab_call::ports::{LocalTrack, MediaConnector, MediaRoom, RemoteParticipant};
use confab_core::{MediaConnectionState, MediaError, Transport};
use tokio::sync::watch;

use crate::log::EventLog;

/// A [`MediaRoom`] the test drives directly.
pub struct ScriptedRoom {
    transport: Transport,
    log: EventLog,
    state: watch::Sender<MediaConnectionState>,
    participants: watch::Sender<Vec<RemoteParticipant>>,
    published: Mutex<Vec<String>>,
    fail_publish: Mutex<Option<MediaError>>,
}

impl ScriptedRoom {
    fn new(transport: Transport, log: EventLog) -> Self {
        Self {
            transport,
            log,
            state: watch::Sender::new(MediaConnectionState::Connected),
            participants: watch::Sender::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            fail_publish: Mutex::new(None),
        }
    }

    /// Drive the connection state. Retained even while nothing subscribes
    /// yet.
    pub fn set_state(&self, state: MediaConnectionState) {
        self.state.send_replace(state);
    }

    /// Replace the live remote participants. Retained even while nothing
    /// subscribes yet.
    pub fn set_participants(&self, participants: Vec<RemoteParticipant>) {
        self.participants.send_replace(participants);
    }

    /// Track ids currently published into this room.
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make the next `publish` fail with `error`.
    pub fn fail_next_publish(&self, error: MediaError) {
        *self.fail_publish.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl MediaRoom for ScriptedRoom {
    fn state(&self) -> watch::Receiver<MediaConnectionState> {
        self.state.subscribe()
    }

    fn participants(&self) -> watch::Receiver<Vec<RemoteParticipant>> {
        self.participants.subscribe()
    }

    async fn publish(&self, track: Arc<dyn LocalTrack>) -> Result<(), MediaError> {
        if let Some(error) = self.fail_publish.lock().unwrap_or_else(PoisonError::into_inner).take()
        {
            self.log.record(format!("room.publish failed {} {}", self.transport, track.id()));
            return Err(error);
        }
        self.log.record(format!("room.publish {} {}", self.transport, track.id()));
        self.published.lock().unwrap_or_else(PoisonError::into_inner).push(track.id().to_string());
        Ok(())
    }

    async fn unpublish(&self, track_id: &str) -> Result<(), MediaError> {
        self.log.record(format!("room.unpublish {} {track_id}", self.transport));
        self.published.lock().unwrap_or_else(PoisonError::into_inner).retain(|id| id != track_id);
        Ok(())
    }

    async fn close(&self) {
        self.log.record(format!("room.close {}", self.transport));
        self.state.send_replace(MediaConnectionState::Disconnected);
    }
}

/// A [`MediaConnector`] handing out [`ScriptedRoom`]s and retaining them
/// for the test to drive.
pub struct ScriptedMedia {
    log: EventLog,
    rooms: Mutex<Vec<Arc<ScriptedRoom>>>,
    fail_connect: Mutex<Option<MediaError>>,
}

impl ScriptedMedia {
    /// Connector with no rooms yet.
    pub fn new(log: EventLog) -> Self {
        Self { log, rooms: Mutex::new(Vec::new()), fail_connect: Mutex::new(None) }
    }

    /// Rooms created so far, in connect order.
    pub fn rooms(&self) -> Vec<Arc<ScriptedRoom>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The room connected for `transport`, if any.
    pub fn room_for(&self, transport: &Transport) -> Option<Arc<ScriptedRoom>> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| &r.transport == transport)
            .cloned()
    }

    /// Make the next `connect` fail with `error`.
    pub fn fail_next_connect(&self, error: MediaError) {
        *self.fail_connect.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl MediaConnector for ScriptedMedia {
    async fn connect(&self, transport: &Transport) -> Result<Arc<dyn MediaRoom>, MediaError> {
        if let Some(error) = self.fail_connect.lock().unwrap_or_else(PoisonError::into_inner).take()
        {
            self.log.record(format!("media.connect failed {transport}"));
            return Err(error);
        }
        self.log.record(format!("media.connect {transport}"));
        let room = Arc::new(ScriptedRoom::new(transport.clone(), self.log.clone()));
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&room));
        Ok(room)
    }
}

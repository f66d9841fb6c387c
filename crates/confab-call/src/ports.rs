//! Capability traits for external collaborators.
//!
//! Each trait names exactly the operations this engine consumes — nothing
//! more. Production adapters wrap the real protocol and media SDKs; the
//! harness provides scripted fakes that type-check against the same seams.

use std::sync::Arc;

use async_trait::async_trait;
use confab_core::{
    MediaConnectionState, MediaError, Membership, ParticipantId, SessionError, SessionStatus,
    Transport, TransportError,
};
use tokio::sync::watch;

/// Declared purpose of the call, pushed to the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallIntent {
    /// Audio-only call.
    Audio,
    /// Video call.
    Video,
}

/// The messaging-protocol session, as consumed by this engine.
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Roster of memberships, ordered oldest-first by the protocol layer.
    fn roster(&self) -> watch::Receiver<Vec<Membership>>;

    /// Homeserver session status.
    fn status(&self) -> watch::Receiver<SessionStatus>;

    /// Join the call session on the given transport.
    async fn join(&self, transport: &Transport) -> Result<(), SessionError>;

    /// Leave the call session. Invoked as best-effort cleanup.
    async fn leave(&self) -> Result<(), SessionError>;

    /// Push the declared call intent.
    async fn update_call_intent(&self, intent: CallIntent) -> Result<(), SessionError>;
}

/// `.well-known` focus discovery for a homeserver domain.
#[async_trait]
pub trait FocusDiscovery: Send + Sync {
    /// Transports advertised by the domain, preferred-first.
    async fn well_known_foci(&self, domain: &str) -> Result<Vec<Transport>, TransportError>;
}

/// Token exchange against an SFU, run before a transport is advertised.
///
/// Retryable failures are the implementation's concern; what surfaces here
/// is terminal.
#[async_trait]
pub trait SfuAuthPort: Send + Sync {
    /// Complete one authentication round trip against the transport.
    async fn exchange_token(&self, transport: &Transport) -> Result<(), TransportError>;
}

/// A live media room participant, snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    /// The `user:device` identity the participant announced.
    pub identity: ParticipantId,
    /// Currently speaking.
    pub speaking: bool,
    /// Publishing camera video.
    pub has_video: bool,
    /// Publishing a screen share.
    pub screen_sharing: bool,
}

/// Kind of a local media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Microphone audio.
    Audio,
    /// Camera video.
    Video,
    /// Screen capture.
    ScreenShare,
}

/// Which local tracks to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRequest {
    /// Create a microphone track.
    pub audio: bool,
    /// Create a camera track.
    pub video: bool,
}

impl TrackRequest {
    /// True when no track kind is requested at all.
    pub fn is_empty(self) -> bool {
        !self.audio && !self.video
    }
}

/// A local media track owned by the current publisher.
#[async_trait]
pub trait LocalTrack: Send + Sync {
    /// Stable track identifier.
    fn id(&self) -> &str;

    /// Kind of media this track carries.
    fn kind(&self) -> TrackKind;

    /// Pause or resume the upstream feed.
    async fn set_paused(&self, paused: bool) -> Result<(), MediaError>;

    /// Stop the track and release the device.
    async fn stop(&self);
}

/// Local capture devices (camera, microphone, screen).
#[async_trait]
pub trait DevicePort: Send + Sync {
    /// Create the requested local tracks.
    async fn create_tracks(
        &self,
        request: TrackRequest,
    ) -> Result<Vec<Arc<dyn LocalTrack>>, MediaError>;

    /// Capture the screen as a single local track.
    async fn create_screen_share(&self) -> Result<Arc<dyn LocalTrack>, MediaError>;
}

/// A joined media room on one transport.
#[async_trait]
pub trait MediaRoom: Send + Sync {
    /// Connection state of this room.
    fn state(&self) -> watch::Receiver<MediaConnectionState>;

    /// Live remote participants in this room.
    fn participants(&self) -> watch::Receiver<Vec<RemoteParticipant>>;

    /// Publish a local track into the room.
    async fn publish(&self, track: Arc<dyn LocalTrack>) -> Result<(), MediaError>;

    /// Withdraw a previously published track.
    async fn unpublish(&self, track_id: &str) -> Result<(), MediaError>;

    /// Leave the room and release the connection.
    async fn close(&self);
}

/// Factory for media rooms, one per transport.
#[async_trait]
pub trait MediaConnector: Send + Sync {
    /// Connect to the media room addressed by `transport`.
    async fn connect(&self, transport: &Transport) -> Result<Arc<dyn MediaRoom>, MediaError>;
}

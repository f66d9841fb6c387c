//! Error taxonomy for the call engine.
//!
//! Strongly-typed errors per layer: transport resolution, session
//! (messaging protocol), media connection, and publishing. Fatal errors
//! block the call and surface on the view model's fatal-error stream;
//! publish errors are soft — the user can still receive others' media.
//!
//! [`ErrorLatch`] implements first-error-wins retention: the first error
//! of a call is kept for diagnostics, later ones are logged but never
//! overwrite it.

use thiserror::Error;

use crate::transport::Transport;

/// Errors resolving or priming a media transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No transport could be resolved from any source in the chain.
    #[error("no media transport discoverable for {domain}")]
    NoTransport {
        /// Homeserver domain the discovery ran against.
        domain: String,
    },

    /// Well-known discovery failed.
    #[error("focus discovery failed for {domain}: {reason}")]
    Discovery {
        /// Homeserver domain the discovery ran against.
        domain: String,
        /// Underlying failure description.
        reason: String,
    },

    /// Token exchange against the SFU failed with a non-retryable status.
    #[error("token exchange rejected by {transport}: status {status}")]
    AuthRejected {
        /// Transport the exchange ran against.
        transport: Transport,
        /// HTTP-level status reported by the auth endpoint.
        status: u16,
    },

    /// Token exchange failed after the lower layer exhausted its retries.
    #[error("token exchange failed against {transport}: {reason}")]
    AuthFailed {
        /// Transport the exchange ran against.
        transport: Transport,
        /// Underlying failure description.
        reason: String,
    },
}

/// Errors from the messaging-protocol session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Joining the session failed.
    #[error("session join failed: {0}")]
    JoinFailed(String),

    /// Leaving the session failed. Best-effort cleanup only logs this.
    #[error("session leave failed: {0}")]
    LeaveFailed(String),

    /// Pushing a call-intent update failed.
    #[error("call intent update failed: {0}")]
    IntentFailed(String),
}

/// Errors from the media-transport connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The SFU refused the connection for capacity reasons.
    #[error("media server at capacity")]
    ServerAtCapacity,

    /// The SFU refused to create or join the room.
    #[error("media room unavailable: {0}")]
    RoomUnavailable(String),

    /// Connection lost or failed for a transient reason.
    #[error("media connection lost: {0}")]
    ConnectionLost(String),

    /// Local device access failed (camera/microphone).
    #[error("device access failed: {0}")]
    DeviceFailed(String),
}

impl MediaError {
    /// True if this error is transient and a reconnect may succeed.
    ///
    /// Capacity and room-policy refusals are terminal; a lost connection
    /// is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

/// Errors while publishing local tracks. Always soft.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Track creation was requested with every kind disabled.
    #[error("refusing to create zero tracks: audio and video both disabled")]
    NoTracksRequested,

    /// Creating a local track failed.
    #[error("track creation failed: {0}")]
    TrackCreation(String),

    /// Publishing a created track failed. Remaining tracks are skipped.
    #[error("publishing track {track} failed: {reason}")]
    TrackPublish {
        /// Identifier of the track that failed.
        track: String,
        /// Underlying failure description.
        reason: String,
    },
}

/// Union of all call-engine errors, classified by fatality.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Transport resolution or priming failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Messaging-protocol session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Media connection failed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Publishing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CallError {
    /// True when this error should block the call with an error screen.
    ///
    /// Publish errors and transient media errors are soft: receiving
    /// others' media still works.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Session(_) => true,
            Self::Media(e) => !e.is_transient(),
            Self::Publish(_) => false,
        }
    }

    /// Machine-readable code for the error screen.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::NoTransport { .. }) => "no_transport",
            Self::Transport(TransportError::Discovery { .. }) => "discovery_failed",
            Self::Transport(
                TransportError::AuthRejected { .. } | TransportError::AuthFailed { .. },
            ) => "auth_failed",
            Self::Session(_) => "session_failed",
            Self::Media(MediaError::ServerAtCapacity) => "server_at_capacity",
            Self::Media(MediaError::RoomUnavailable(_)) => "room_unavailable",
            Self::Media(MediaError::ConnectionLost(_)) => "connection_lost",
            Self::Media(MediaError::DeviceFailed(_)) => "device_failed",
            Self::Publish(_) => "publish_failed",
        }
    }
}

/// First-error-wins retention.
///
/// The first recorded error is kept; subsequent errors are logged as
/// "multiple errors" for diagnostics but never replace it. This keeps the
/// error screen pointing at the root cause rather than at whatever failed
/// last during teardown.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    first: Option<CallError>,
    later: usize,
}

impl ErrorLatch {
    /// Empty latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Returns true if it became the retained first error.
    pub fn record(&mut self, error: CallError) -> bool {
        match &self.first {
            None => {
                tracing::error!(code = error.code(), %error, "call error");
                self.first = Some(error);
                true
            },
            Some(first) => {
                self.later += 1;
                tracing::warn!(
                    code = error.code(),
                    %error,
                    retained = first.code(),
                    count = self.later,
                    "multiple errors, retaining first"
                );
                false
            },
        }
    }

    /// The retained first error, if any.
    pub fn first(&self) -> Option<&CallError> {
        self.first.as_ref()
    }

    /// Number of errors recorded after the first.
    pub fn suppressed(&self) -> usize {
        self.later
    }
}

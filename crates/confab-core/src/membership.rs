//! Session roster entries and shared connection-status enums.
//!
//! A [`Membership`] is one (user, device) pair's presence in the call
//! session, as pushed by the messaging protocol. Roster ordering is
//! supplied by the protocol layer; position 0 is "the oldest member" and
//! anchors transport inheritance.

use crate::{
    ids::{DeviceId, ParticipantId, UserId},
    transport::{Transport, TransportSelector},
};

/// One roster entry: a (user, device) pair participating in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// User half of the membership identity.
    pub user_id: UserId,
    /// Device half of the membership identity.
    pub device_id: DeviceId,
    /// Protocol event that created this membership.
    pub event_id: String,
    /// Declared or inherited transport choice.
    pub selector: TransportSelector,
}

impl Membership {
    /// The `user:device` pairing key for this membership.
    pub fn participant_id(&self) -> ParticipantId {
        ParticipantId::new(self.user_id.clone(), self.device_id.clone())
    }

    /// Resolve this membership's transport against the oldest roster member.
    ///
    /// Returns `None` when the selector defers to the oldest member and the
    /// oldest member's own transport cannot be resolved (empty roster, or a
    /// cyclic `OldestMember` declaration at position 0).
    pub fn transport(&self, oldest: Option<&Membership>) -> Option<Transport> {
        match &self.selector {
            TransportSelector::Declared(t) => Some(t.clone()),
            TransportSelector::OldestMember => match oldest {
                Some(m) if m != self => m.transport(None),
                _ => None,
            },
        }
    }
}

/// Messaging-protocol session status as observed by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No live homeserver connection.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Homeserver connection confirmed live.
    Connected,
    /// The server believes we already left the session.
    ProbablyLeft,
}

impl SessionStatus {
    /// True when the homeserver connection is confirmed live.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Media-transport connection state for one [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaConnectionState {
    /// Not connected.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Media room joined and live.
    Connected,
    /// Connection failed terminally.
    Failed,
}

impl MediaConnectionState {
    /// True when the media room is joined and live.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

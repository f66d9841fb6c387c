//! Identity types for call participants.
//!
//! A participant is a (user, device) pair: one user may join a call from
//! several devices, and each device gets its own roster entry, media
//! tracks, and tile. The media layer identifies remote participants by the
//! combined `user:device` key, so [`ParticipantId`] is the join key between
//! the session roster and live media participants.

use std::fmt;

/// Opaque user identifier as supplied by the messaging protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// Wrap a protocol-level user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque device identifier as supplied by the messaging protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a protocol-level device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `user:device` pairing key shared with the media transport.
///
/// Remote media participants announce themselves under this combined
/// identity; the reconciliation pipeline uses it to pair media
/// participants with roster memberships.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId {
    /// User half of the pairing key.
    pub user_id: UserId,
    /// Device half of the pairing key.
    pub device_id: DeviceId,
}

impl ParticipantId {
    /// Build the pairing key from its halves.
    pub fn new(user_id: UserId, device_id: DeviceId) -> Self {
        Self { user_id, device_id }
    }

    /// Parse a `user:device` string as announced by the media transport.
    ///
    /// The user half may itself contain colons (protocol user ids often
    /// do), so the split is on the *last* colon.
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, device) = raw.rsplit_once(':')?;
        if user.is_empty() || device.is_empty() {
            return None;
        }
        Some(Self { user_id: UserId::new(user), device_id: DeviceId::new(device) })
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.device_id)
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_round_trips() {
        let id = ParticipantId::new(UserId::new("@alice:example.org"), DeviceId::new("DEVICEA"));
        let parsed = ParticipantId::parse(&id.to_string()).expect("parse own display form");
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_splits_on_last_colon() {
        let parsed = ParticipantId::parse("@bob:example.org:PHONE").expect("valid key");
        assert_eq!(parsed.user_id.as_str(), "@bob:example.org");
        assert_eq!(parsed.device_id.as_str(), "PHONE");
    }

    #[test]
    fn parse_rejects_missing_halves() {
        assert!(ParticipantId::parse("nodevice").is_none());
        assert!(ParticipantId::parse(":DEVICE").is_none());
        assert!(ParticipantId::parse("@alice:").is_none());
    }
}

//! Addressable media-transport endpoints.
//!
//! A [`Transport`] names one reachable SFU room: a service URL plus a room
//! alias on that service. Equality is structural, so two memberships that
//! declare the same URL/alias pair share one connection.

use serde::{Deserialize, Serialize};
use url::Url;

/// One reachable media-transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transport {
    /// Base URL of the SFU service.
    pub service_url: Url,
    /// Room alias on that service.
    pub room_alias: String,
}

impl Transport {
    /// Build a transport from a service URL and room alias.
    pub fn new(service_url: Url, room_alias: impl Into<String>) -> Self {
        Self { service_url, room_alias: room_alias.into() }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.service_url, self.room_alias)
    }
}

/// How a membership declares which transport it is reachable on.
///
/// Roster entries either carry an explicit endpoint or defer to the oldest
/// member's choice ("follow the room"). The reconciliation step resolves
/// `OldestMember` against roster position 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportSelector {
    /// The membership declared a concrete endpoint.
    Declared(Transport),
    /// Inherit whatever the oldest roster member uses.
    OldestMember,
}

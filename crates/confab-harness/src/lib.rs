//! Scripted fakes for every Confab port, plus test helpers.
//!
//! The fakes type-check against the same capability traits production
//! adapters implement. Each one records what was done to it into a shared
//! [`EventLog`], so tests can assert global ordering across ports (for
//! example that every unpublish happened before the session leave).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod devices;
mod log;
mod media;
mod session;
mod transport;
mod widget;

pub use devices::{FakeTrack, RecordingDevices};
pub use log::EventLog;
pub use media::{ScriptedMedia, ScriptedRoom};
pub use session::ScriptedSession;
pub use transport::{StaticAuth, StaticDiscovery, test_transport};
pub use widget::ScriptedWidget;

use confab_core::{DeviceId, Membership, ParticipantId, TransportSelector, UserId};

/// Build a roster membership for tests.
pub fn member(user: &str, device: &str, selector: TransportSelector) -> Membership {
    Membership {
        user_id: UserId::new(user),
        device_id: DeviceId::new(device),
        event_id: format!("$ev-{user}-{device}"),
        selector,
    }
}

/// Build a `user:device` identity for tests.
pub fn participant(user: &str, device: &str) -> ParticipantId {
    ParticipantId::new(UserId::new(user), DeviceId::new(device))
}

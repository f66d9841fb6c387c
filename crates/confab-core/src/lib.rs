//! Core primitives and data model for Confab.
//!
//! Everything above this crate (roster reconciliation, connection
//! management, the publisher state machine, the call view model) is built
//! from the pieces defined here:
//!
//! - [`reactive`]: the `Behavior` cell, the `Scope` lifetime boundary and
//!   its serialized `reconcile` discipline, and `Epoch` tagging.
//! - [`ids`]: user/device/participant identities.
//! - [`transport`]: addressable SFU endpoints and per-membership selectors.
//! - [`membership`]: session roster entries and shared status enums.
//! - [`error`]: the call error taxonomy and first-error retention.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod ids;
pub mod membership;
pub mod reactive;
pub mod transport;

pub use error::{CallError, ErrorLatch, MediaError, PublishError, SessionError, TransportError};
pub use ids::{DeviceId, ParticipantId, UserId};
pub use membership::{MediaConnectionState, Membership, SessionStatus};
pub use reactive::{Behavior, Cleanup, Epoch, EpochCounter, Scope};
pub use transport::{Transport, TransportSelector};

//! Call-session orchestration for Confab.
//!
//! This crate turns the two external sources of truth — the messaging
//! protocol's session roster and the media transport's live rooms — plus
//! local user intent into consistent call state:
//!
//! - [`ports`]: narrow capability traits for every external collaborator.
//! - [`resolve`]: the local transport resolution chain.
//! - [`roster`]: membership/transport reconciliation and participant
//!   pairing.
//! - [`connections`]: one live [`connections::Connection`] per distinct
//!   transport in use.
//! - [`publisher`]: the local membership state machine (track creation,
//!   publishing, session join/leave).
//! - [`errors`]: fatal/soft error routing on top of the core taxonomy.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connections;
pub mod errors;
pub mod ports;
pub mod publisher;
pub mod resolve;
pub mod roster;

pub use connections::{Connection, ConnectionManager};
pub use errors::ErrorSink;
pub use ports::{
    CallIntent, DevicePort, FocusDiscovery, LocalTrack, MediaConnector, MediaRoom,
    RemoteParticipant, SessionPort, SfuAuthPort, TrackKind, TrackRequest,
};
pub use publisher::{
    DeviceIntent, LocalMemberState, LocalMembership, PublishState, TrackState, TransportState,
};
pub use resolve::{TransportConfig, resolve_local_transport};
pub use roster::TaggedParticipant;

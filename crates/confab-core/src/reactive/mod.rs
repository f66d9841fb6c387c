//! Reactive primitives: value cells, lifetime scopes, epoch tagging.
//!
//! This is a deliberately minimal reactive layer rather than a streams
//! framework: state lives in [`Behavior`] cells (hot, replay-1), lifetimes
//! are explicit [`Scope`]s, and the one genuinely subtle piece is
//! [`Scope::reconcile`] — serialized async setup/cleanup with
//! latest-value coalescing. [`Epoch`] tags let independently-derived
//! values be recombined without observing half-propagated updates.

mod behavior;
mod epoch;
mod scope;

pub use behavior::Behavior;
pub use epoch::{Epoch, EpochCounter};
pub use scope::{Cleanup, Scope};

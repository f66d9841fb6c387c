//! Application-layer call state for Confab.
//!
//! Everything a renderer needs, composed from the orchestration layer:
//!
//! - [`view_model`]: the [`view_model::CallViewModel`] wiring roster,
//!   connections, publisher, and presentation state together.
//! - [`layout`]: the pure tile-arrangement engine.
//! - [`window`] / [`mode`] / [`spotlight`]: viewport classification,
//!   grid/spotlight preference, and spotlight selection.
//! - [`reactions`] / [`sounds`]: reaction aggregation and sound gating.
//! - [`widget`]: host-widget messaging when running embedded.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod layout;
pub mod mode;
pub mod reactions;
pub mod sounds;
pub mod spotlight;
pub mod view_model;
pub mod widget;
pub mod window;

pub use layout::{Layout, LayoutInput, MediaItem, SortingBin, TileId, TileStore, select_layout};
pub use mode::{ModePreference, VideoMode};
pub use reactions::{ActiveReaction, REACTION_DURATION, ReactionBoard};
pub use sounds::{MAX_AUDIBLE_PARTICIPANTS, SOUND_THROTTLE, SoundGate, SoundKind};
pub use spotlight::select_spotlight;
pub use view_model::{AudioRoute, CallConfig, CallPorts, CallViewModel, LayoutSnapshot};
pub use widget::{WidgetNotification, WidgetPort, WidgetRequest};
pub use window::{WindowMode, classify};

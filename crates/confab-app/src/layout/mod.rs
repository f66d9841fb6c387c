//! The layout engine: pure tile arrangement.
//!
//! [`select_layout`] maps a declarative description of the media to
//! arrange — plus window mode, the resolved grid/spotlight mode, and the
//! renderer's visible-tile-count feedback — onto one of six layout
//! shapes. Every shape threads the previous [`TileStore`] through so tile
//! positions persist across shape transitions wherever possible.
//!
//! The visible-tile count is a one-step-delayed fixed point: the renderer
//! reports how many tiles actually fit only after a layout has been
//! rendered, so the first pass assumes zero and the next pass settles.

mod tiles;

pub use tiles::{TileId, TileStore};

use confab_core::ParticipantId;

use crate::{mode::VideoMode, window::WindowMode};

/// Sorting bin of a media item. Lower sorts earlier in grids and
/// thumbnail strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortingBin {
    /// The local participant's own tile.
    SelfTile,
    /// A screen share.
    Presenter,
    /// Currently speaking.
    Speaker,
    /// Hand raised.
    HandRaised,
    /// Camera video available.
    Video,
    /// No video.
    NoVideo,
}

/// One presentational unit to arrange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Tile identity, stable across recomputation.
    pub id: TileId,
    /// The participant this item belongs to.
    pub participant: ParticipantId,
    /// Layout sorting bin.
    pub bin: SortingBin,
    /// True for screen-share items.
    pub screen_share: bool,
}

/// A concrete arrangement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Equal tiles.
    Grid {
        /// Tiles in display order.
        tiles: Vec<TileId>,
    },
    /// Spotlight beside a horizontal thumbnail strip.
    SpotlightLandscape {
        /// The enlarged tile.
        spotlight: TileId,
        /// Thumbnail tiles, capped by the visible-tile feedback.
        thumbs: Vec<TileId>,
    },
    /// Spotlight above a vertical thumbnail strip.
    SpotlightPortrait {
        /// The enlarged tile.
        spotlight: TileId,
        /// Thumbnail tiles, capped by the visible-tile feedback.
        thumbs: Vec<TileId>,
    },
    /// Spotlight filling the window, with at most the local tile floating.
    SpotlightExpanded {
        /// The enlarged tile.
        spotlight: TileId,
        /// Floating self tile, when present and pip is allowed.
        pip: Option<TileId>,
    },
    /// Two participants face to face.
    OneOnOne {
        /// The remote tile.
        remote: TileId,
        /// The local tile.
        local: TileId,
    },
    /// Single tile in a picture-in-picture window.
    Pip {
        /// The shown tile.
        tile: TileId,
    },
}

/// Inputs to layout selection.
#[derive(Debug, Clone)]
pub struct LayoutInput<'a> {
    /// Window mode from viewport classification.
    pub window: WindowMode,
    /// Resolved grid/spotlight mode (after the preference machine).
    pub mode: VideoMode,
    /// Whether picture-in-picture shapes are allowed.
    pub pip_enabled: bool,
    /// Renderer feedback: tiles actually on screen. Zero on first pass.
    pub visible_tiles: usize,
    /// The sticky spotlight selection, when one is held.
    pub spotlight: Option<&'a ParticipantId>,
    /// Media to arrange.
    pub media: &'a [MediaItem],
}

/// The context-driven mode before user preference is applied.
pub fn natural_mode(media: &[MediaItem]) -> VideoMode {
    if media.iter().any(|m| m.screen_share) { VideoMode::Spotlight } else { VideoMode::Grid }
}

/// Select and arrange a layout, returning the updated tile store.
pub fn select_layout(input: &LayoutInput<'_>, store: &TileStore) -> (Layout, TileStore) {
    if input.media.is_empty() {
        return (Layout::Grid { tiles: Vec::new() }, store.assign(&[]));
    }

    let has_screen_share = input.media.iter().any(|m| m.screen_share);

    if input.window == WindowMode::Pip && input.pip_enabled {
        return arrange_pip(input, store);
    }

    if has_screen_share || input.mode == VideoMode::Spotlight {
        return arrange_spotlight(input, store);
    }

    if input.window == WindowMode::Normal && input.media.len() == 2 {
        if let Some(layout) = arrange_one_on_one(input, store) {
            return layout;
        }
    }

    arrange_grid(input, store)
}

fn sorted_ids(media: &[MediaItem], store: &TileStore) -> Vec<TileId> {
    let ids: Vec<TileId> = media.iter().map(|m| m.id.clone()).collect();
    let mut order = store.stable_order(&ids);
    // Stable sort: within a bin, previously assigned positions survive.
    order.sort_by_key(|id| media.iter().find(|m| &m.id == id).map_or(SortingBin::NoVideo, |m| m.bin));
    order
}

/// The tile to enlarge. Screen shares outrank everything; below that the
/// sticky selection wins, so the big tile does not flicker between
/// participants whenever the sort order shifts.
fn spotlight_target(input: &LayoutInput<'_>) -> Option<TileId> {
    let media = input.media;
    if let Some(sticky) = input.spotlight {
        if let Some(item) = media.iter().find(|m| m.screen_share && &m.participant == sticky) {
            return Some(item.id.clone());
        }
    }
    if let Some(item) = media.iter().find(|m| m.screen_share) {
        return Some(item.id.clone());
    }
    if let Some(sticky) = input.spotlight {
        if let Some(item) = media
            .iter()
            .find(|m| m.bin != SortingBin::SelfTile && &m.participant == sticky)
        {
            return Some(item.id.clone());
        }
    }
    media
        .iter()
        .filter(|m| m.bin != SortingBin::SelfTile)
        .min_by_key(|m| m.bin)
        .or_else(|| media.iter().min_by_key(|m| m.bin))
        .map(|m| m.id.clone())
}

fn arrange_grid(input: &LayoutInput<'_>, store: &TileStore) -> (Layout, TileStore) {
    let tiles = sorted_ids(input.media, store);
    let next = store.assign(&tiles);
    (Layout::Grid { tiles }, next)
}

fn arrange_one_on_one(
    input: &LayoutInput<'_>,
    store: &TileStore,
) -> Option<(Layout, TileStore)> {
    let local = input.media.iter().find(|m| m.bin == SortingBin::SelfTile)?;
    let remote = input.media.iter().find(|m| m.bin != SortingBin::SelfTile)?;
    let next = store.assign(&[remote.id.clone(), local.id.clone()]);
    Some((Layout::OneOnOne { remote: remote.id.clone(), local: local.id.clone() }, next))
}

fn arrange_spotlight(input: &LayoutInput<'_>, store: &TileStore) -> (Layout, TileStore) {
    let Some(spotlight) = spotlight_target(input) else {
        return arrange_grid(input, store);
    };

    if input.window == WindowMode::Flat || (input.window == WindowMode::Pip && !input.pip_enabled)
    {
        let pip = input
            .media
            .iter()
            .find(|m| m.bin == SortingBin::SelfTile && m.id != spotlight)
            .filter(|_| input.pip_enabled)
            .map(|m| m.id.clone());
        let mut assigned = vec![spotlight.clone()];
        assigned.extend(pip.clone());
        let next = store.assign(&assigned);
        return (Layout::SpotlightExpanded { spotlight, pip }, next);
    }

    let mut thumbs: Vec<TileId> =
        sorted_ids(input.media, store).into_iter().filter(|id| *id != spotlight).collect();
    // One-step-delayed fixed point: the renderer has not reported a
    // capacity yet on the first pass, so no thumbnails are placed.
    thumbs.truncate(input.visible_tiles);

    let mut assigned = vec![spotlight.clone()];
    assigned.extend(thumbs.iter().cloned());
    let next = store.assign(&assigned);

    let layout = if input.window == WindowMode::Narrow {
        Layout::SpotlightPortrait { spotlight, thumbs }
    } else {
        Layout::SpotlightLandscape { spotlight, thumbs }
    };
    (layout, next)
}

fn arrange_pip(input: &LayoutInput<'_>, store: &TileStore) -> (Layout, TileStore) {
    let Some(tile) = spotlight_target(input) else {
        return arrange_grid(input, store);
    };
    let next = store.assign(std::slice::from_ref(&tile));
    (Layout::Pip { tile }, next)
}

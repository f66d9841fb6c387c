//! Persistent tile-position assignment.
//!
//! The [`TileStore`] survives layout recomputation so that tiles whose
//! set membership did not change keep their position instead of visually
//! resetting. Every reassignment that actually changes the tile order
//! bumps the generation; an identical assignment leaves it untouched.

/// Identity of one tile (one media item).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub String);

impl TileId {
    /// Wrap a media-item identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation-stamped tile ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileStore {
    generation: u64,
    order: Vec<TileId>,
}

impl TileStore {
    /// Empty store at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Strictly increases on every assignment change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The current tile order.
    pub fn order(&self) -> &[TileId] {
        &self.order
    }

    /// Position of a tile, if assigned.
    pub fn position(&self, tile: &TileId) -> Option<usize> {
        self.order.iter().position(|t| t == tile)
    }

    /// Reassign to exactly `tiles`. No-op (same store, same generation)
    /// when the assignment is identical.
    pub fn assign(&self, tiles: &[TileId]) -> TileStore {
        if self.order == tiles {
            self.clone()
        } else {
            TileStore { generation: self.generation + 1, order: tiles.to_vec() }
        }
    }

    /// The previous order restricted to `tiles`, with new tiles appended
    /// in their given order. This is what keeps surviving tiles in place
    /// across set changes.
    pub fn stable_order(&self, tiles: &[TileId]) -> Vec<TileId> {
        let mut order: Vec<TileId> =
            self.order.iter().filter(|t| tiles.contains(t)).cloned().collect();
        for tile in tiles {
            if !order.contains(tile) {
                order.push(tile.clone());
            }
        }
        order
    }
}

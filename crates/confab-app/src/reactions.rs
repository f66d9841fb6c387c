//! Reaction aggregation: one active reaction per participant.
//!
//! A reaction event for an identity that already has an active reaction
//! is ignored outright — it neither replaces the reaction nor extends its
//! expiry. Keeps a burst of duplicate events from restarting animations.

use std::collections::HashMap;

use confab_core::ParticipantId;
use tokio::time::Instant;

/// How long a reaction stays active.
pub const REACTION_DURATION: std::time::Duration = std::time::Duration::from_secs(3);

/// A reaction currently showing for a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveReaction {
    /// Reaction key (emoji shortcode or similar).
    pub kind: String,
    /// When this reaction stops showing.
    pub expires_at: Instant,
}

/// Per-call reaction state.
#[derive(Debug, Clone, Default)]
pub struct ReactionBoard {
    active: HashMap<ParticipantId, ActiveReaction>,
}

impl ReactionBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a reaction event. Returns true if it was accepted.
    pub fn observe(&mut self, id: ParticipantId, kind: impl Into<String>, now: Instant) -> bool {
        self.expire(now);
        if self.active.contains_key(&id) {
            return false;
        }
        self.active
            .insert(id, ActiveReaction { kind: kind.into(), expires_at: now + REACTION_DURATION });
        true
    }

    /// Drop reactions whose window has passed.
    pub fn expire(&mut self, now: Instant) {
        self.active.retain(|_, r| r.expires_at > now);
    }

    /// Currently active reactions.
    pub fn active(&self) -> &HashMap<ParticipantId, ActiveReaction> {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use confab_core::{DeviceId, UserId};

    use super::*;

    fn id(user: &str) -> ParticipantId {
        ParticipantId::new(UserId::new(user), DeviceId::new("DEV"))
    }

    #[tokio::test(start_paused = true)]
    async fn second_reaction_is_ignored_while_active() {
        let mut board = ReactionBoard::new();
        let now = Instant::now();
        assert!(board.observe(id("@a:x"), "👍", now));

        let expiry_before = board.active()[&id("@a:x")].expires_at;
        assert!(!board.observe(id("@a:x"), "🎉", now + REACTION_DURATION / 2));

        // Neither replaced nor extended.
        let current = &board.active()[&id("@a:x")];
        assert_eq!(current.kind, "👍");
        assert_eq!(current.expires_at, expiry_before);
    }

    #[tokio::test(start_paused = true)]
    async fn reaction_expires_after_window() {
        let mut board = ReactionBoard::new();
        let now = Instant::now();
        assert!(board.observe(id("@a:x"), "👍", now));

        board.expire(now + REACTION_DURATION);
        assert!(board.active().is_empty());

        // A fresh reaction is accepted again.
        assert!(board.observe(id("@a:x"), "🎉", now + REACTION_DURATION));
    }

    #[tokio::test(start_paused = true)]
    async fn reactions_are_per_identity() {
        let mut board = ReactionBoard::new();
        let now = Instant::now();
        assert!(board.observe(id("@a:x"), "👍", now));
        assert!(board.observe(id("@b:x"), "👍", now));
        assert_eq!(board.active().len(), 2);
    }
}

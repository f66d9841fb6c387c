//! Sound-effect gating.
//!
//! Join/leave/hand-raise/screen-share pulses are throttled per kind and
//! suppressed entirely above a participant-count threshold, so large
//! calls do not turn into audio spam.

use std::collections::HashMap;

use tokio::time::Instant;

/// No sound effects at all above this many participants.
pub const MAX_AUDIBLE_PARTICIPANTS: usize = 8;

/// Minimum spacing between two pulses of the same kind.
pub const SOUND_THROTTLE: std::time::Duration = std::time::Duration::from_millis(500);

/// A sound-effect pulse kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundKind {
    /// Someone joined.
    Join,
    /// Someone left.
    Leave,
    /// Someone raised a hand.
    HandRaise,
    /// Someone started a screen share.
    ScreenShare,
}

/// Throttle/suppression gate in front of the sound player.
#[derive(Debug, Clone, Default)]
pub struct SoundGate {
    last: HashMap<SoundKind, Instant>,
}

impl SoundGate {
    /// Fresh gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pulse of `kind` should play now.
    ///
    /// Records the pulse when admitted, so back-to-back triggers of the
    /// same kind inside the throttle window collapse into one.
    pub fn admit(&mut self, kind: SoundKind, participant_count: usize, now: Instant) -> bool {
        if participant_count > MAX_AUDIBLE_PARTICIPANTS {
            return false;
        }
        if let Some(last) = self.last.get(&kind) {
            if now.duration_since(*last) < SOUND_THROTTLE {
                return false;
            }
        }
        self.last.insert(kind, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pulses_are_throttled_per_kind() {
        let mut gate = SoundGate::new();
        let now = Instant::now();

        assert!(gate.admit(SoundKind::Join, 2, now));
        assert!(!gate.admit(SoundKind::Join, 2, now + SOUND_THROTTLE / 2));
        // A different kind is not held back by the join pulse.
        assert!(gate.admit(SoundKind::Leave, 2, now + SOUND_THROTTLE / 2));
        assert!(gate.admit(SoundKind::Join, 2, now + SOUND_THROTTLE));
    }

    #[tokio::test(start_paused = true)]
    async fn large_calls_are_silent() {
        let mut gate = SoundGate::new();
        let now = Instant::now();

        assert!(!gate.admit(SoundKind::Join, MAX_AUDIBLE_PARTICIPANTS + 1, now));
        // Suppression does not consume the throttle slot.
        assert!(gate.admit(SoundKind::Join, MAX_AUDIBLE_PARTICIPANTS, now));
    }
}

//! Active-speaker spotlight selection.
//!
//! Sticky by design: the current spotlight only moves when its holder
//! stops being a reasonable choice, so the big tile does not flicker
//! between speakers. The precedence below is normative.

use std::collections::HashSet;

use confab_core::ParticipantId;

/// Pick the spotlight target.
///
/// Precedence:
/// 1. the previously spotlighted remote, if still present and speaking;
/// 2. any currently speaking remote;
/// 3. the previously spotlighted remote regardless of speaking state;
/// 4. any remote;
/// 5. the local participant.
pub fn select_spotlight(
    previous: Option<&ParticipantId>,
    remotes: &[ParticipantId],
    speaking: &HashSet<ParticipantId>,
    local: &ParticipantId,
) -> ParticipantId {
    if let Some(prev) = previous {
        if remotes.contains(prev) && speaking.contains(prev) {
            return prev.clone();
        }
    }
    if let Some(speaker) = remotes.iter().find(|r| speaking.contains(r)) {
        return speaker.clone();
    }
    if let Some(prev) = previous {
        if remotes.contains(prev) {
            return prev.clone();
        }
    }
    if let Some(any) = remotes.first() {
        return any.clone();
    }
    local.clone()
}

#[cfg(test)]
mod tests {
    use confab_core::{DeviceId, UserId};

    use super::*;

    fn id(user: &str) -> ParticipantId {
        ParticipantId::new(UserId::new(user), DeviceId::new("DEV"))
    }

    #[test]
    fn sticky_speaker_keeps_spotlight_when_another_starts_speaking() {
        let a = id("@a:x");
        let b = id("@b:x");
        let local = id("@me:x");
        let remotes = vec![a.clone(), b.clone()];
        let speaking: HashSet<_> = [a.clone(), b.clone()].into();

        // Both speak; the previous holder wins.
        assert_eq!(select_spotlight(Some(&a), &remotes, &speaking, &local), a);
    }

    #[test]
    fn silent_previous_holder_yields_to_a_speaker() {
        let a = id("@a:x");
        let b = id("@b:x");
        let local = id("@me:x");
        let remotes = vec![a.clone(), b.clone()];
        let speaking: HashSet<_> = [b.clone()].into();

        assert_eq!(select_spotlight(Some(&a), &remotes, &speaking, &local), b);
    }

    #[test]
    fn silent_call_keeps_previous_holder() {
        let a = id("@a:x");
        let b = id("@b:x");
        let local = id("@me:x");
        let remotes = vec![a.clone(), b.clone()];
        let speaking = HashSet::new();

        assert_eq!(select_spotlight(Some(&b), &remotes, &speaking, &local), b);
    }

    #[test]
    fn departed_previous_holder_falls_back_to_any_remote() {
        let a = id("@a:x");
        let gone = id("@gone:x");
        let local = id("@me:x");
        let remotes = vec![a.clone()];
        let speaking = HashSet::new();

        assert_eq!(select_spotlight(Some(&gone), &remotes, &speaking, &local), a);
    }

    #[test]
    fn empty_call_spotlights_local() {
        let local = id("@me:x");
        assert_eq!(select_spotlight(None, &[], &HashSet::new(), &local), local);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            // Whatever the speaking set and history, the spotlight always
            // lands on an actual remote while any remote is present, and
            // on the local participant only in an otherwise empty call.
            #[test]
            fn spotlight_is_never_empty_or_stale(
                users in proptest::collection::vec("@[a-z]{1,8}:x", 0..6),
                speaking_mask in proptest::collection::vec(any::<bool>(), 0..6),
                prev_index in proptest::option::of(0usize..6),
            ) {
                let local = id("@me:x");
                let remotes: Vec<_> = users.iter().map(|u| id(u.as_str())).collect();
                let speaking: HashSet<_> = remotes
                    .iter()
                    .zip(speaking_mask.iter())
                    .filter(|(_, s)| **s)
                    .map(|(r, _)| r.clone())
                    .collect();
                let previous = prev_index.and_then(|i| remotes.get(i % remotes.len().max(1)));

                let chosen = select_spotlight(previous, &remotes, &speaking, &local);
                if remotes.is_empty() {
                    prop_assert_eq!(chosen, local);
                } else {
                    prop_assert!(remotes.contains(&chosen));
                }
            }
        }
    }
}

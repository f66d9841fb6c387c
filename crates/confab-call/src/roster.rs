//! Membership/transport reconciliation.
//!
//! Given the session roster, decide which transport each membership is
//! reached on, derive the deduplicated set of required transports, and
//! pair live media participants with their roster entries. Roster
//! ordering is supplied by the protocol layer; position 0 is the oldest
//! member.

use confab_core::{Membership, ParticipantId, Transport};

use crate::ports::RemoteParticipant;

/// A membership paired with its media-side counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedParticipant {
    /// This client's own membership.
    Local {
        /// The local roster entry.
        membership: Membership,
    },
    /// A remote membership, with its media participant once one appears.
    Remote {
        /// The remote roster entry.
        membership: Membership,
        /// Live media participant. `None` means the membership is still
        /// waiting for media — an expected state, not an error.
        participant: Option<RemoteParticipant>,
    },
}

impl TaggedParticipant {
    /// The pairing key of the underlying membership.
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::Local { membership } | Self::Remote { membership, .. } => {
                membership.participant_id()
            },
        }
    }
}

/// The oldest roster member, per protocol-layer ordering.
pub fn oldest(roster: &[Membership]) -> Option<&Membership> {
    roster.first()
}

/// The transport a membership should be reached on.
pub fn transport_for(membership: &Membership, roster: &[Membership]) -> Option<Transport> {
    membership.transport(oldest(roster))
}

/// Deduplicated transports the roster requires, first-seen order.
pub fn required_transports(roster: &[Membership]) -> Vec<Transport> {
    let mut seen = Vec::new();
    for membership in roster {
        if let Some(transport) = transport_for(membership, roster) {
            if !seen.contains(&transport) {
                seen.push(transport);
            }
        } else {
            tracing::debug!(
                member = %membership.participant_id(),
                "membership has no resolvable transport yet"
            );
        }
    }
    seen
}

/// Pair roster memberships with live media participants.
///
/// Matching is by the `user:device` pairing key. A media participant with
/// no matching membership is dropped (and logged — the SFU should not have
/// admitted it); a membership with no media participant yet is retained in
/// the waiting-for-media state.
pub fn pair_participants(
    roster: &[Membership],
    local: &ParticipantId,
    media: &[RemoteParticipant],
) -> Vec<TaggedParticipant> {
    let mut matched = vec![false; media.len()];
    let mut out = Vec::with_capacity(roster.len());

    for membership in roster {
        let id = membership.participant_id();
        if id == *local {
            out.push(TaggedParticipant::Local { membership: membership.clone() });
            continue;
        }
        let participant = media.iter().enumerate().find_map(|(i, p)| {
            if p.identity == id {
                matched[i] = true;
                Some(p.clone())
            } else {
                None
            }
        });
        out.push(TaggedParticipant::Remote { membership: membership.clone(), participant });
    }

    for (i, participant) in media.iter().enumerate() {
        if !matched[i] && participant.identity != *local {
            tracing::warn!(
                identity = %participant.identity,
                "media participant with no matching membership, dropping"
            );
        }
    }

    out
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use confab_core::{DeviceId, TransportSelector, UserId};
    use url::Url;

    use super::*;

    fn transport(service: &str) -> Transport {
        Transport::new(Url::parse(service).expect("valid test url"), "!call:example.org")
    }

    fn member(user: &str, device: &str, selector: TransportSelector) -> Membership {
        Membership {
            user_id: UserId::new(user),
            device_id: DeviceId::new(device),
            event_id: format!("$ev-{user}-{device}"),
            selector,
        }
    }

    fn remote(user: &str, device: &str) -> RemoteParticipant {
        RemoteParticipant {
            identity: ParticipantId::new(UserId::new(user), DeviceId::new(device)),
            speaking: false,
            has_video: true,
            screen_sharing: false,
        }
    }

    #[test]
    fn required_transports_deduplicate_in_first_seen_order() {
        let a = transport("https://sfu-a.example.org");
        let b = transport("https://sfu-b.example.org");
        let roster = vec![
            member("@one:x", "D1", TransportSelector::Declared(a.clone())),
            member("@two:x", "D2", TransportSelector::Declared(b.clone())),
            member("@three:x", "D3", TransportSelector::Declared(a.clone())),
            member("@four:x", "D4", TransportSelector::OldestMember),
        ];

        assert_eq!(required_transports(&roster), vec![a, b]);
    }

    #[test]
    fn oldest_member_inheritance_resolves_through_roster_head() {
        let a = transport("https://sfu-a.example.org");
        let roster = vec![
            member("@old:x", "D0", TransportSelector::Declared(a.clone())),
            member("@new:x", "D1", TransportSelector::OldestMember),
        ];

        assert_eq!(transport_for(&roster[1], &roster), Some(a));
    }

    #[test]
    fn pairing_matches_by_user_device_key() {
        let t = TransportSelector::Declared(transport("https://sfu.example.org"));
        let roster = vec![
            member("@me:x", "LOCAL", t.clone()),
            member("@peer:x", "D1", t.clone()),
        ];
        let local = ParticipantId::new(UserId::new("@me:x"), DeviceId::new("LOCAL"));
        let media = vec![remote("@peer:x", "D1")];

        let tagged = pair_participants(&roster, &local, &media);
        assert_eq!(tagged.len(), 2);
        assert!(matches!(&tagged[0], TaggedParticipant::Local { .. }));
        assert!(matches!(
            &tagged[1],
            TaggedParticipant::Remote { participant: Some(p), .. }
                if p.identity == media[0].identity
        ));
    }

    #[test]
    fn membership_without_media_waits() {
        let t = TransportSelector::Declared(transport("https://sfu.example.org"));
        let roster = vec![
            member("@me:x", "LOCAL", t.clone()),
            member("@slow:x", "D9", t.clone()),
        ];
        let local = ParticipantId::new(UserId::new("@me:x"), DeviceId::new("LOCAL"));

        let tagged = pair_participants(&roster, &local, &[]);
        assert!(matches!(&tagged[1], TaggedParticipant::Remote { participant: None, .. }));
    }

    #[test]
    fn unmatched_media_participant_is_dropped() {
        let t = TransportSelector::Declared(transport("https://sfu.example.org"));
        let roster = vec![member("@me:x", "LOCAL", t)];
        let local = ParticipantId::new(UserId::new("@me:x"), DeviceId::new("LOCAL"));
        let media = vec![remote("@ghost:x", "D666")];

        let tagged = pair_participants(&roster, &local, &media);
        assert_eq!(tagged.len(), 1);
        assert!(matches!(&tagged[0], TaggedParticipant::Local { .. }));
    }
}

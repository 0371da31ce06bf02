//! Pairwise conversation identity.
//!
//! A conversation id is `sort(a, b).join("_")`. It is never stored on its own;
//! it only partitions messages, and both participants arrive at the same key
//! without a lookup table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::errors::{GearError, GearResult};
use crate::common::ids::{CONVERSATION_SEPARATOR, ParticipantId};

/// Symmetric key of a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId {
    key: String,
    low: ParticipantId,
    high: ParticipantId,
}

impl ConversationId {
    /// Derive the conversation between two distinct participants.
    ///
    /// # Errors
    /// Returns `InvalidInput` if both sides are the same participant.
    pub fn between(a: &ParticipantId, b: &ParticipantId) -> GearResult<Self> {
        if a == b {
            return Err(GearError::invalid(format!(
                "participant {a} cannot start a conversation with itself"
            )));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            key: format!("{low}{CONVERSATION_SEPARATOR}{high}"),
            low: low.clone(),
            high: high.clone(),
        })
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The two participants, in sorted order.
    #[must_use]
    pub const fn participants(&self) -> (&ParticipantId, &ParticipantId) {
        (&self.low, &self.high)
    }

    /// Whether `participant` is one of the two sides.
    #[must_use]
    pub fn includes(&self, participant: &ParticipantId) -> bool {
        &self.low == participant || &self.high == participant
    }

    /// The side that is not `participant`, if `participant` is a member.
    #[must_use]
    pub fn peer_of(&self, participant: &ParticipantId) -> Option<&ParticipantId> {
        if &self.low == participant {
            Some(&self.high)
        } else if &self.high == participant {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// Derive the conversation id for `self_id` talking to `peer_id`.
///
/// Pure and symmetric: swapping the arguments yields the same id.
///
/// # Errors
/// Returns `InvalidInput` if either token is empty or malformed, or if both
/// are the same participant.
pub fn derive_conversation_id(self_id: &str, peer_id: &str) -> GearResult<ConversationId> {
    let me = ParticipantId::new(self_id)?;
    let peer = ParticipantId::new(peer_id)?;
    ConversationId::between(&me, &peer)
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for ConversationId {
    type Err = GearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s.split_once(CONVERSATION_SEPARATOR).ok_or_else(|| {
            GearError::invalid(format!("conversation id {s:?} has no separator"))
        })?;
        let id = derive_conversation_id(low, high)?;
        if id.as_str() != s {
            return Err(GearError::invalid(format!(
                "conversation id {s:?} is not in canonical order"
            )));
        }
        Ok(id)
    }
}

impl TryFrom<String> for ConversationId {
    type Error = GearError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_symmetric() {
        for (a, b) in [("u1", "u2"), ("zeta", "alpha"), ("B", "a"), ("x9", "x10")] {
            assert_eq!(
                derive_conversation_id(a, b).unwrap(),
                derive_conversation_id(b, a).unwrap()
            );
        }
    }

    #[test]
    fn test_known_pair() {
        let id = derive_conversation_id("u2", "u1").unwrap();
        assert_eq!(id.as_str(), "u1_u2");
    }

    #[test]
    fn test_self_pair_rejected() {
        assert!(matches!(derive_conversation_id("u1", "u1"), Err(GearError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(derive_conversation_id("", "u1").is_err());
        assert!(derive_conversation_id("u1", "").is_err());
    }

    #[test]
    fn test_participants_and_peer() {
        let id = derive_conversation_id("u2", "u1").unwrap();
        let u1 = ParticipantId::new("u1").unwrap();
        let u2 = ParticipantId::new("u2").unwrap();
        let u3 = ParticipantId::new("u3").unwrap();

        assert_eq!(id.participants(), (&u1, &u2));
        assert!(id.includes(&u1));
        assert!(!id.includes(&u3));
        assert_eq!(id.peer_of(&u1), Some(&u2));
        assert_eq!(id.peer_of(&u3), None);
    }

    #[test]
    fn test_parse_requires_canonical_form() {
        assert_eq!(
            "u1_u2".parse::<ConversationId>().unwrap().as_str(),
            "u1_u2"
        );
        assert!("u2_u1".parse::<ConversationId>().is_err());
        assert!("u1".parse::<ConversationId>().is_err());
        assert!("u1_u1".parse::<ConversationId>().is_err());
    }
}

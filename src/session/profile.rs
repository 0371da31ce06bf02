//! Public profile of a participant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::ids::ParticipantId;
use crate::session::Identity;

/// Profile document looked up by participant token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Participant token.
    pub uid: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub photo_url: Option<String>,
    /// First time the profile was stored.
    pub member_since: DateTime<Utc>,
}

impl UserProfile {
    /// Profile mirroring a signed-in identity.
    #[must_use]
    pub fn from_identity(identity: &Identity, member_since: DateTime<Utc>) -> Self {
        Self {
            uid: identity.id.clone(),
            name: identity.display_name.clone(),
            photo_url: identity.avatar.clone(),
            member_since,
        }
    }

    /// Label such as `January 2024`.
    #[must_use]
    pub fn member_since_label(&self) -> String {
        self.member_since.format("%B %Y").to_string()
    }
}

//! Chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::conversation::ConversationId;
use crate::common::errors::{GearError, GearResult};
use crate::common::ids::{ListingId, MessageId, ParticipantId};
use crate::session::Identity;

/// A stored, immutable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Conversation that owns the message.
    pub conversation_id: ConversationId,
    /// Sender token.
    pub sender_id: ParticipantId,
    /// Sender display name at send time.
    pub sender_name: String,
    /// Sender avatar at send time.
    pub sender_avatar: Option<String>,
    /// Body as typed.
    pub body: String,
    /// Listing the message was sent about, if any.
    pub listing_id: Option<ListingId>,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether `participant` sent this message.
    #[must_use]
    pub fn is_from(&self, participant: &ParticipantId) -> bool {
        &self.sender_id == participant
    }

    /// Short timestamp label, e.g. `Oct 5, 3:07 PM`.
    #[must_use]
    pub fn display_time(&self) -> String {
        self.created_at.format("%b %-d, %-I:%M %p").to_string()
    }

    /// Document-store record shape.
    #[must_use]
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            text: self.body.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: self.sender_name.clone(),
            sender_photo: self.sender_avatar.clone(),
            timestamp: self.created_at,
            item_id: self.listing_id,
        }
    }
}

/// A message about to be appended. Carries no id or timestamp; the store
/// assigns both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    /// Sender token.
    pub sender_id: ParticipantId,
    /// Sender display name.
    pub sender_name: String,
    /// Sender avatar.
    pub sender_avatar: Option<String>,
    /// Body as typed.
    pub body: String,
    /// Related listing.
    pub listing_id: Option<ListingId>,
}

impl NewMessage {
    /// Build a message from `sender`.
    ///
    /// The body is kept as typed; it only has to contain something other
    /// than whitespace.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the body is empty after trimming.
    pub fn new(
        sender: &Identity,
        body: impl Into<String>,
        listing_id: Option<ListingId>,
    ) -> GearResult<Self> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(GearError::invalid("message body is empty"));
        }
        Ok(Self {
            sender_id: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            sender_avatar: sender.avatar.clone(),
            body,
            listing_id,
        })
    }
}

/// Wire shape of a message document:
/// `{ text, senderId, senderName, senderPhoto, timestamp, itemId }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Body.
    pub text: String,
    /// Sender token.
    pub sender_id: ParticipantId,
    /// Sender display name.
    pub sender_name: String,
    /// Sender avatar, `null` when absent.
    pub sender_photo: Option<String>,
    /// Store-assigned creation time.
    pub timestamp: DateTime<Utc>,
    /// Related listing, `null` when absent.
    pub item_id: Option<ListingId>,
}

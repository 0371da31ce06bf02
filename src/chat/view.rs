//! Presentation state for one open conversation.

use tracing::warn;

use crate::chat::channel::ConversationChannel;
use crate::chat::conversation::ConversationId;
use crate::chat::message::Message;
use crate::common::errors::GearResult;
use crate::common::ids::{ListingId, ParticipantId};
use crate::session::{Identity, UserProfile};
use crate::store::Snapshot;

/// Avatar shown when the peer has none.
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";
/// Name shown when the peer's profile is missing.
pub const FALLBACK_PEER_NAME: &str = "User";
/// Presence label. There is no presence tracking behind it.
pub const PEER_STATUS_LABEL: &str = "Active now";

/// Rendered message list of one conversation.
#[derive(Clone, Debug)]
pub struct ConversationView {
    conversation: ConversationId,
    viewer: ParticipantId,
    messages: Snapshot,
    last_error: Option<String>,
    listing_context: Option<ListingId>,
}

impl ConversationView {
    /// Empty view for `viewer`, optionally opened from a listing page.
    #[must_use]
    pub fn new(
        conversation: ConversationId,
        viewer: ParticipantId,
        listing_context: Option<ListingId>,
    ) -> Self {
        Self {
            conversation,
            viewer,
            messages: Vec::new(),
            last_error: None,
            listing_context,
        }
    }

    /// Apply one feed update. A snapshot replaces the list; an error is
    /// recorded and the current list stays as it was.
    pub fn apply(&mut self, update: GearResult<Snapshot>) {
        match update {
            Ok(snapshot) => {
                self.messages = snapshot;
                self.last_error = None;
            }
            Err(err) => {
                warn!(conversation = %self.conversation, %err, "Conversation feed failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Conversation shown.
    #[must_use]
    pub const fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    /// Messages in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether the viewer sent `message`.
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        message.is_from(&self.viewer)
    }

    /// Whether there is nothing to show yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Error from the last failed update, cleared by the next snapshot.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Listing to show above the thread: the one the conversation was opened
    /// from, else the latest message that mentions one.
    #[must_use]
    pub fn related_listing(&self) -> Option<ListingId> {
        self.listing_context.or_else(|| {
            self.messages
                .iter()
                .rev()
                .find_map(|message| message.listing_id)
        })
    }
}

/// Text input of the conversation page.
#[derive(Clone, Debug, Default)]
pub struct Composer {
    draft: String,
}

impl Composer {
    /// Current draft.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft.
    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Whether the send button is enabled.
    #[must_use]
    pub fn can_send(&self) -> bool {
        !self.draft.trim().is_empty()
    }

    /// Send the draft. It is cleared only once the store accepted it, so a
    /// failed send can be retried as typed.
    ///
    /// # Errors
    /// Returns the error of [`ConversationChannel::send_message`].
    pub async fn submit(
        &mut self,
        channel: &ConversationChannel,
        conversation: &ConversationId,
        sender: &Identity,
        related_listing: Option<ListingId>,
    ) -> GearResult<()> {
        channel
            .send_message(conversation, sender, &self.draft, related_listing)
            .await?;
        self.draft.clear();
        Ok(())
    }
}

/// Peer header of the conversation page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatHeader {
    /// Peer display name.
    pub name: String,
    /// Peer avatar.
    pub avatar: String,
    /// Status line.
    pub status: &'static str,
}

impl ChatHeader {
    /// Header for a peer whose profile may be missing.
    #[must_use]
    pub fn for_peer(profile: Option<&UserProfile>) -> Self {
        let name = profile
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_PEER_NAME);
        let avatar = profile
            .and_then(|p| p.photo_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_AVATAR);

        Self {
            name: name.to_string(),
            avatar: avatar.to_string(),
            status: PEER_STATUS_LABEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::common::clock::ManualClock;
    use crate::common::config::GearConfig;
    use crate::common::errors::{ChannelError, GearError};
    use crate::common::ids::MessageId;
    use crate::session::Session;
    use crate::store::{MessageStore, ProfileStore, SqliteBackends};

    fn participant(uid: &str) -> ParticipantId {
        ParticipantId::new(uid).unwrap()
    }

    fn conversation() -> ConversationId {
        "u1_u2".parse().unwrap()
    }

    fn message(from: &str, listing: Option<ListingId>) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id: conversation(),
            sender_id: participant(from),
            sender_name: from.to_string(),
            sender_avatar: None,
            body: "hi".to_string(),
            listing_id: listing,
            created_at: Utc.timestamp_millis_opt(1_000).single().unwrap(),
        }
    }

    #[test]
    fn test_error_keeps_rendered_list() {
        let mut view = ConversationView::new(conversation(), participant("u1"), None);
        view.apply(Ok(vec![message("u1", None), message("u2", None)]));
        view.apply(Err(GearError::Channel(ChannelError::Unavailable(
            "offline".to_string(),
        ))));

        assert_eq!(view.messages().len(), 2);
        assert!(view.last_error().is_some());

        view.apply(Ok(vec![message("u1", None)]));
        assert_eq!(view.messages().len(), 1);
        assert!(view.last_error().is_none());
    }

    #[test]
    fn test_is_own() {
        let mut view = ConversationView::new(conversation(), participant("u1"), None);
        assert!(view.is_empty());
        view.apply(Ok(vec![message("u1", None), message("u2", None)]));
        let own: Vec<_> = view.messages().iter().map(|m| view.is_own(m)).collect();
        assert_eq!(own, [true, false]);
    }

    #[test]
    fn test_related_listing() {
        let context = ListingId::new();
        let mentioned = ListingId::new();
        let snapshot = vec![
            message("u1", Some(ListingId::new())),
            message("u2", Some(mentioned)),
            message("u1", None),
        ];

        let mut opened_from_listing =
            ConversationView::new(conversation(), participant("u1"), Some(context));
        opened_from_listing.apply(Ok(snapshot.clone()));
        assert_eq!(opened_from_listing.related_listing(), Some(context));

        let mut plain = ConversationView::new(conversation(), participant("u1"), None);
        assert_eq!(plain.related_listing(), None);
        plain.apply(Ok(snapshot));
        assert_eq!(plain.related_listing(), Some(mentioned));
    }

    #[test]
    fn test_header_fallbacks() {
        let header = ChatHeader::for_peer(None);
        assert_eq!(header.name, "User");
        assert_eq!(header.avatar, "/default-avatar.png");
        assert_eq!(header.status, "Active now");

        let profile = UserProfile {
            uid: participant("u2"),
            name: "Sam".to_string(),
            photo_url: Some("https://img.example/sam.png".to_string()),
            member_since: Utc.timestamp_millis_opt(0).single().unwrap(),
        };
        let header = ChatHeader::for_peer(Some(&profile));
        assert_eq!(header.name, "Sam");
        assert_eq!(header.avatar, "https://img.example/sam.png");
    }

    #[tokio::test]
    async fn test_submit_clears_draft_only_on_success() {
        let config = GearConfig::default();
        let backends = SqliteBackends::in_memory(&config, Arc::new(ManualClock::at_millis(1)))
            .await
            .unwrap();
        let messages: Arc<dyn MessageStore> = backends.messages.clone();
        let profiles: Arc<dyn ProfileStore> = backends.profiles.clone();
        let me = Identity::new(participant("u1"), "Una");
        let channel =
            ConversationChannel::new(&config, Session::signed_in(me.clone()), messages, profiles)
                .unwrap();

        let mut composer = Composer::default();
        composer.set_draft("   ");
        assert!(!composer.can_send());
        assert!(composer.submit(&channel, &conversation(), &me, None).await.is_err());
        assert_eq!(composer.draft(), "   ");

        composer.set_draft("Is this still available?");
        assert!(composer.can_send());
        composer
            .submit(&channel, &conversation(), &me, None)
            .await
            .unwrap();
        assert_eq!(composer.draft(), "");

        let stored = backends.messages.load_ordered(&conversation()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body, "Is this still available?");
    }
}

//! Conversation channel: derive, subscribe, send.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat::conversation::ConversationId;
use crate::chat::feed::{MessageFeed, Registry, SubscriptionHandle, UpdateCallback};
use crate::chat::message::NewMessage;
use crate::common::config::GearConfig;
use crate::common::errors::{GearError, GearResult};
use crate::common::ids::{ListingId, ParticipantId};
use crate::session::{Identity, Session, UserProfile};
use crate::store::{MessageStore, ProfileStore, Snapshot};

/// Chat entry point for one signed-in client.
pub struct ConversationChannel {
    session: Session,
    messages: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileStore>,
    profile_cache: Mutex<LruCache<ParticipantId, UserProfile>>,
    active: Registry,
    next_subscription: AtomicU64,
}

impl ConversationChannel {
    /// Create a channel over the given session and stores.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: &GearConfig,
        session: Session,
        messages: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> GearResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.profiles.cache_capacity).ok_or_else(|| {
            GearError::InvalidConfig("profiles.cache_capacity must be > 0".to_string())
        })?;

        Ok(Self {
            session,
            messages,
            profiles,
            profile_cache: Mutex::new(LruCache::new(capacity)),
            active: Arc::new(DashMap::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    /// Session this channel reads the current participant from.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Conversation between the signed-in participant and `peer`.
    ///
    /// # Errors
    /// Returns `InvalidInput` if nobody is signed in or `peer` is the
    /// signed-in participant.
    pub fn conversation_with(&self, peer: &ParticipantId) -> GearResult<ConversationId> {
        let me = self.session.require_current()?;
        ConversationId::between(&me.id, peer)
    }

    /// Open a live feed of ordered snapshots.
    ///
    /// # Errors
    /// Returns an error if the store cannot register the listener.
    pub async fn open_feed(&self, conversation: &ConversationId) -> GearResult<MessageFeed> {
        let stream = self.messages.live_query(conversation).await?;
        let handle = self.register(conversation, None);
        debug!(subscription = handle.id(), %conversation, "Feed opened");
        Ok(MessageFeed::new(stream, handle))
    }

    /// Deliver every ordered snapshot of `conversation` to `on_update` until
    /// the returned handle is cancelled.
    ///
    /// A store failure is passed to `on_update` as `Err` and ends the
    /// subscription without retrying. An ended subscription leaves the active
    /// set on its own.
    ///
    /// # Errors
    /// Returns an error if the store cannot register the listener.
    pub async fn subscribe_to_messages<F>(
        &self,
        conversation: &ConversationId,
        on_update: F,
    ) -> GearResult<SubscriptionHandle>
    where
        F: FnMut(GearResult<Snapshot>) + Send + 'static,
    {
        let stream = self.messages.live_query(conversation).await?;
        let callback: UpdateCallback = Box::new(on_update);
        let handle = self.register(conversation, Some(callback));
        info!(subscription = handle.id(), %conversation, "Subscribed to messages");

        tokio::spawn(MessageFeed::new(stream, handle.clone()).pump());
        Ok(handle)
    }

    /// Append a message from `sender`.
    ///
    /// The message becomes visible only through live queries once the store
    /// has stamped it; nothing is echoed locally.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a blank body or a sender outside the
    /// conversation (nothing is written), or a channel error if the write
    /// fails.
    pub async fn send_message(
        &self,
        conversation: &ConversationId,
        sender: &Identity,
        body: &str,
        related_listing: Option<ListingId>,
    ) -> GearResult<()> {
        if !conversation.includes(&sender.id) {
            return Err(GearError::invalid(format!(
                "{} is not a participant of {conversation}",
                sender.id
            )));
        }
        let message = NewMessage::new(sender, body, related_listing)?;

        match self.messages.append(conversation, message).await {
            Ok(id) => {
                debug!(%conversation, message = %id, sender = %sender.id, "Message sent");
                Ok(())
            }
            Err(err) => {
                warn!(%conversation, sender = %sender.id, %err, "Failed to send message");
                Err(err)
            }
        }
    }

    /// [`Self::send_message`] as the signed-in participant.
    ///
    /// # Errors
    /// Returns `InvalidInput` if nobody is signed in, otherwise as
    /// [`Self::send_message`].
    pub async fn send_as_current(
        &self,
        conversation: &ConversationId,
        body: &str,
        related_listing: Option<ListingId>,
    ) -> GearResult<()> {
        let me = self.session.require_current()?;
        self.send_message(conversation, &me, body, related_listing).await
    }

    /// Look up a participant's profile. Found profiles are cached.
    ///
    /// # Errors
    /// Returns an error if the store lookup fails.
    pub async fn peer_profile(&self, peer: &ParticipantId) -> GearResult<Option<UserProfile>> {
        if let Some(profile) = self.profile_cache.lock().await.get(peer) {
            return Ok(Some(profile.clone()));
        }

        let found = self.profiles.find_profile(peer).await?;
        if let Some(profile) = &found {
            self.profile_cache
                .lock()
                .await
                .put(peer.clone(), profile.clone());
        }
        Ok(found)
    }

    /// Number of subscriptions not yet cancelled.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active.len()
    }

    /// Cancel every subscription opened through this channel, as on sign-out
    /// or teardown. Returns how many were still live.
    pub fn cancel_all(&self) -> usize {
        let cancelled = SubscriptionHandle::cancel_registered(&self.active);
        if cancelled > 0 {
            info!(cancelled, "Cancelled all subscriptions");
        }
        cancelled
    }

    fn register(
        &self,
        conversation: &ConversationId,
        callback: Option<UpdateCallback>,
    ) -> SubscriptionHandle {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        SubscriptionHandle::register(id, conversation.clone(), callback, Arc::clone(&self.active))
    }
}

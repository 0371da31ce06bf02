//! Store seams and their `SQLite` implementations.
//!
//! The chat channel and the listing pages only talk to the traits here:
//! - `MessageStore`: append, ordered load, live ordered query
//! - `ProfileStore`: one-shot profile lookup by participant token
//! - `ListingStore`: listing documents
//!
//! The bundled backends share one `tokio_rusqlite::Connection`.

pub mod backends;
pub mod listing_store;
pub mod message_store;
pub mod profile_store;

use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::chat::conversation::ConversationId;
use crate::chat::message::{Message, NewMessage};
use crate::common::errors::GearResult;
use crate::common::ids::{ListingId, MessageId, ParticipantId};
use crate::listings::listing::{Listing, NewListing};
use crate::session::{Identity, UserProfile};

pub use backends::SqliteBackends;
pub use listing_store::SqliteListingStore;
pub use message_store::SqliteMessageStore;
pub use profile_store::SqliteProfileStore;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Full ordered message list of one conversation, as of one change.
pub type Snapshot = Vec<Message>;

/// Live query output: one snapshot per observed change batch.
///
/// An `Err` item is terminal; the stream ends right after it.
pub type SnapshotStream = BoxStream<'static, GearResult<Snapshot>>;

/// Message storage with ordered live queries.
pub trait MessageStore: Send + Sync {
    /// Durably insert `message`, stamping it with the store's clock.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn append(
        &self,
        conversation: &ConversationId,
        message: NewMessage,
    ) -> StoreFuture<'_, GearResult<MessageId>>;

    /// Current messages ordered by creation time, then insertion order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn load_ordered(&self, conversation: &ConversationId) -> StoreFuture<'_, GearResult<Snapshot>>;

    /// Deliver the current ordered set, then a fresh ordered set after every
    /// change to the conversation. Dropping the stream releases the listener.
    ///
    /// # Errors
    /// Returns an error if the listener cannot be registered.
    fn live_query(
        &self,
        conversation: &ConversationId,
    ) -> StoreFuture<'_, GearResult<SnapshotStream>>;
}

/// Profile lookups.
pub trait ProfileStore: Send + Sync {
    /// Find the profile of `uid`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_profile(&self, uid: &ParticipantId) -> StoreFuture<'_, GearResult<Option<UserProfile>>>;

    /// Insert or refresh a profile. `member_since` of an existing profile is kept.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert_profile(&self, profile: &UserProfile) -> StoreFuture<'_, GearResult<()>>;
}

/// Listing documents.
pub trait ListingStore: Send + Sync {
    /// Validate and publish a listing owned by `owner`.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a bad form, or a storage error.
    fn create(&self, listing: NewListing, owner: &Identity) -> StoreFuture<'_, GearResult<Listing>>;

    /// Fetch one listing.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, id: ListingId) -> StoreFuture<'_, GearResult<Option<Listing>>>;

    /// Newest listings first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_recent(&self, limit: usize) -> StoreFuture<'_, GearResult<Vec<Listing>>>;

    /// Listings of one owner, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_by_owner(&self, owner: &ParticipantId) -> StoreFuture<'_, GearResult<Vec<Listing>>>;

    /// Flip availability. Returns `false` if the listing does not exist.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set_available(&self, id: ListingId, available: bool) -> StoreFuture<'_, GearResult<bool>>;
}

/// Adapt the receiving end of a snapshot channel into a [`SnapshotStream`].
#[must_use]
pub fn snapshot_stream(rx: mpsc::Receiver<GearResult<Snapshot>>) -> SnapshotStream {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|snapshot| (snapshot, rx))
    })
    .boxed()
}

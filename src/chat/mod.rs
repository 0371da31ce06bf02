//! Two-party chat between renters and owners.
//!
//! - `conversation`: symmetric conversation ids
//! - `message`: stored and outgoing messages
//! - `feed`: live ordered feeds and their cancellation handles
//! - `channel`: derive, subscribe and send
//! - `view`: presentation state of an open conversation

pub mod channel;
pub mod conversation;
pub mod feed;
pub mod message;
pub mod view;

pub use channel::ConversationChannel;
pub use conversation::{ConversationId, derive_conversation_id};
pub use feed::{MessageFeed, SubscriptionHandle, UpdateCallback};
pub use message::{Message, MessageRecord, NewMessage};
pub use view::{ChatHeader, Composer, ConversationView};

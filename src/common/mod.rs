//! Shared identifiers, configuration, clock and error types.

pub mod clock;
pub mod config;
pub mod errors;
pub mod ids;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FeedConfig, GearConfig, ProfileConfig, StorageConfig};
pub use errors::{ChannelError, GearError, GearResult};
pub use ids::{CONVERSATION_SEPARATOR, ListingId, MessageId, ParticipantId};

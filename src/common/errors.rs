//! Error types shared by the chat channel, listings and stores.

use thiserror::Error;

/// Infrastructure failure reported by a store.
///
/// These are never retried inside the crate; callers decide whether to
/// resubmit.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    /// The store refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The store is unreachable or shut down.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum GearError {
    /// Caller-correctable input (bad identity pair, empty body, bad listing).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Infrastructure failure.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GearError {
    /// Shorthand for [`GearError::InvalidInput`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Check if this error came from the store rather than the caller.
    #[must_use]
    pub const fn is_channel_error(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

impl From<rusqlite::Error> for GearError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Channel(ChannelError::Sqlite(err))
    }
}

impl From<tokio_rusqlite::Error> for GearError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Channel(ChannelError::TokioSqlite(err))
    }
}

impl From<serde_json::Error> for GearError {
    fn from(err: serde_json::Error) -> Self {
        Self::Channel(ChannelError::Serialization(err))
    }
}

/// Convenience result alias.
pub type GearResult<T> = Result<T, GearError>;

//! Configuration for the marketplace backends and the chat channel.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::errors::{GearError, GearResult};

/// Environment variable overriding the `SQLite` path.
pub const DB_PATH_ENV: &str = "GEARSHARE_DB";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GearConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Live feed settings.
    pub feed: FeedConfig,
    /// Profile lookup settings.
    pub profiles: ProfileConfig,
}

impl GearConfig {
    /// Defaults, with the database path taken from `GEARSHARE_DB` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                config.storage.sqlite_path = PathBuf::from(path);
            }
        }
        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> GearResult<()> {
        for (field, table) in [
            ("storage.messages_table", &self.storage.messages_table),
            ("storage.profiles_table", &self.storage.profiles_table),
            ("storage.listings_table", &self.storage.listings_table),
        ] {
            if !is_sql_identifier(table) {
                return Err(GearError::InvalidConfig(format!(
                    "{field} must be a plain identifier, got {table:?}"
                )));
            }
        }

        if self.feed.snapshot_buffer == 0 {
            return Err(GearError::InvalidConfig(
                "feed.snapshot_buffer must be > 0".to_string(),
            ));
        }

        if self.feed.change_buffer == 0 {
            return Err(GearError::InvalidConfig(
                "feed.change_buffer must be > 0".to_string(),
            ));
        }

        if self.profiles.cache_capacity == 0 {
            return Err(GearError::InvalidConfig(
                "profiles.cache_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*`.
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Chat message table name.
    pub messages_table: String,
    /// User profile table name.
    pub profiles_table: String,
    /// Listing table name.
    pub listings_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("gearshare.sqlite"),
            messages_table: "chat_messages".to_string(),
            profiles_table: "users".to_string(),
            listings_table: "items".to_string(),
        }
    }
}

/// Live feed settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Snapshots buffered per subscription before the producer waits.
    pub snapshot_buffer: usize,
    /// Change notifications buffered before slow subscribers lag.
    pub change_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            snapshot_buffer: 16,
            change_buffer: 256,
        }
    }
}

/// Profile lookup settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// LRU capacity for found profiles.
    pub cache_capacity: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 128,
        }
    }
}

//! Bundled `SQLite` backends sharing one connection.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::info;

use crate::common::clock::{Clock, SystemClock};
use crate::common::config::GearConfig;
use crate::common::errors::GearResult;
use crate::store::listing_store::SqliteListingStore;
use crate::store::message_store::SqliteMessageStore;
use crate::store::profile_store::SqliteProfileStore;

/// Message, profile and listing stores over a single database.
pub struct SqliteBackends {
    /// Chat messages.
    pub messages: Arc<SqliteMessageStore>,
    /// User profiles.
    pub profiles: Arc<SqliteProfileStore>,
    /// Gear listings.
    pub listings: Arc<SqliteListingStore>,
    /// Clock every store stamps records with.
    pub clock: Arc<dyn Clock>,
}

impl SqliteBackends {
    /// Open the database at `config.storage.sqlite_path` with the wall clock.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(config: &GearConfig) -> GearResult<Self> {
        let conn = Connection::open(&config.storage.sqlite_path).await?;
        info!(path = %config.storage.sqlite_path.display(), "Opened database");
        Self::from_connection(conn, config, Arc::new(SystemClock)).await
    }

    /// A throwaway in-memory database.
    ///
    /// # Errors
    /// Returns an error if initialization fails.
    pub async fn in_memory(config: &GearConfig, clock: Arc<dyn Clock>) -> GearResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::from_connection(conn, config, clock).await
    }

    /// Build every store on an existing connection.
    ///
    /// # Errors
    /// Returns an error if any table cannot be created.
    pub async fn from_connection(
        conn: Connection,
        config: &GearConfig,
        clock: Arc<dyn Clock>,
    ) -> GearResult<Self> {
        let messages =
            Arc::new(SqliteMessageStore::new(conn.clone(), config, Arc::clone(&clock)).await?);
        let profiles = Arc::new(SqliteProfileStore::new(conn.clone(), config).await?);
        let listings =
            Arc::new(SqliteListingStore::new(conn, config, Arc::clone(&clock)).await?);

        Ok(Self {
            messages,
            profiles,
            listings,
            clock,
        })
    }
}

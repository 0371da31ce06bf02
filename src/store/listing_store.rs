//! `SQLite` listing store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio_rusqlite::Connection;
use tracing::info;

use crate::common::clock::Clock;
use crate::common::config::GearConfig;
use crate::common::errors::{ChannelError, GearError, GearResult};
use crate::common::ids::{ListingId, ParticipantId};
use crate::listings::category::Category;
use crate::listings::listing::{Listing, NewListing};
use crate::session::Identity;
use crate::store::{ListingStore, StoreFuture};

const COLUMNS: &str = "id, title, description, category, price_per_day, pickup_location, \
                       images, owner_id, owner_name, owner_photo, available, created_at";

/// Raw columns of one listing row.
struct ListingRow {
    id: String,
    title: String,
    description: String,
    category: String,
    price_per_day: f64,
    pickup_location: String,
    images: String,
    owner_id: String,
    owner_name: String,
    owner_photo: Option<String>,
    available: bool,
    created_at: i64,
}

impl ListingRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            price_per_day: row.get(4)?,
            pickup_location: row.get(5)?,
            images: row.get(6)?,
            owner_id: row.get(7)?,
            owner_name: row.get(8)?,
            owner_photo: row.get(9)?,
            available: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn decode(self) -> GearResult<Listing> {
        let id = self
            .id
            .parse::<ListingId>()
            .map_err(|err| corrupt(format!("invalid listing id: {err}")))?;
        let category = self
            .category
            .parse::<Category>()
            .map_err(|err| corrupt(err.to_string()))?;
        let images: Vec<String> = serde_json::from_str(&self.images)?;
        let owner_id = ParticipantId::new(self.owner_id)
            .map_err(|err| corrupt(format!("invalid owner id: {err}")))?;
        let created_at = Utc
            .timestamp_millis_opt(self.created_at)
            .single()
            .ok_or_else(|| corrupt("invalid created_at"))?;

        Ok(Listing {
            id,
            title: self.title,
            description: self.description,
            category,
            price_per_day: self.price_per_day,
            pickup_location: self.pickup_location,
            images,
            owner_id,
            owner_name: self.owner_name,
            owner_avatar: self.owner_photo,
            available: self.available,
            created_at,
        })
    }
}

fn corrupt(reason: impl Into<String>) -> GearError {
    GearError::Channel(ChannelError::CorruptRecord(reason.into()))
}

/// `SQLite` implementation of listing storage.
pub struct SqliteListingStore {
    conn: Connection,
    table: String,
    clock: Arc<dyn Clock>,
}

impl SqliteListingStore {
    /// Initialize the listing store.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or database
    /// operations fail.
    pub async fn new(
        conn: Connection,
        config: &GearConfig,
        clock: Arc<dyn Clock>,
    ) -> GearResult<Self> {
        config.validate()?;
        let table = config.storage.listings_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL,
                    price_per_day REAL NOT NULL,
                    pickup_location TEXT NOT NULL,
                    images TEXT NOT NULL,
                    owner_id TEXT NOT NULL,
                    owner_name TEXT NOT NULL,
                    owner_photo TEXT,
                    available INTEGER NOT NULL DEFAULT 1,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_created
                    ON {table_name} (created_at DESC);
                CREATE INDEX IF NOT EXISTS idx_{table_name}_owner
                    ON {table_name} (owner_id, created_at DESC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table, clock })
    }

    async fn query(
        &self,
        filter: &'static str,
        param: Option<String>,
        limit: i64,
    ) -> GearResult<Vec<Listing>> {
        let table = self.table.clone();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM {table}
                     {filter}
                     ORDER BY created_at DESC, seq DESC
                     LIMIT ?1"
                ))?;
                let rows = match param {
                    Some(param) => stmt
                        .query_map(rusqlite::params![limit, param], ListingRow::from_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?,
                    None => stmt
                        .query_map(rusqlite::params![limit], ListingRow::from_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?,
                };
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(ListingRow::decode).collect()
    }
}

impl ListingStore for SqliteListingStore {
    fn create(
        &self,
        listing: NewListing,
        owner: &Identity,
    ) -> StoreFuture<'_, GearResult<Listing>> {
        let owner = owner.clone();
        Box::pin(async move {
            listing.validate()?;
            let created = Listing {
                id: ListingId::new(),
                title: listing.title,
                description: listing.description,
                category: listing.category,
                price_per_day: listing.price_per_day,
                pickup_location: listing.pickup_location,
                images: listing.images,
                owner_id: owner.id,
                owner_name: owner.display_name,
                owner_avatar: owner.avatar,
                available: true,
                created_at: self.clock.now(),
            };

            let table = self.table.clone();
            let images = serde_json::to_string(&created.images)?;
            let row = created.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} ({COLUMNS})
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                        ),
                        rusqlite::params![
                            row.id.to_string(),
                            row.title,
                            row.description,
                            row.category.as_str(),
                            row.price_per_day,
                            row.pickup_location,
                            images,
                            row.owner_id.as_str(),
                            row.owner_name,
                            row.owner_avatar,
                            row.available,
                            row.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;

            info!(
                listing = %created.id,
                owner = %created.owner_id,
                category = %created.category,
                "Listing created"
            );
            Ok(created)
        })
    }

    fn get(&self, id: ListingId) -> StoreFuture<'_, GearResult<Option<Listing>>> {
        Box::pin(async move {
            let mut found = self
                .query("WHERE id = ?2", Some(id.to_string()), 1)
                .await?;
            Ok(found.pop())
        })
    }

    fn list_recent(&self, limit: usize) -> StoreFuture<'_, GearResult<Vec<Listing>>> {
        Box::pin(async move {
            let limit = i64::try_from(limit)
                .map_err(|_| GearError::invalid("limit exceeds i64"))?;
            self.query("", None, limit).await
        })
    }

    fn list_by_owner(&self, owner: &ParticipantId) -> StoreFuture<'_, GearResult<Vec<Listing>>> {
        let owner = owner.to_string();
        Box::pin(async move { self.query("WHERE owner_id = ?2", Some(owner), -1).await })
    }

    fn set_available(&self, id: ListingId, available: bool) -> StoreFuture<'_, GearResult<bool>> {
        Box::pin(async move {
            let table = self.table.clone();
            let key = id.to_string();
            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!("UPDATE {table} SET available = ?1 WHERE id = ?2"),
                        rusqlite::params![available, key],
                    )?;
                    Ok(changed)
                })
                .await?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;

    async fn store(clock: Arc<ManualClock>) -> SqliteListingStore {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteListingStore::new(conn, &GearConfig::default(), clock)
            .await
            .unwrap()
    }

    fn owner(uid: &str) -> Identity {
        Identity::new(ParticipantId::new(uid).unwrap(), uid.to_uppercase())
    }

    fn form(title: &str, category: Category) -> NewListing {
        NewListing {
            title: title.to_string(),
            description: "Well kept".to_string(),
            category,
            price_per_day: 15.0,
            pickup_location: "Discovery Park".to_string(),
            images: vec!["https://img.example/a.jpg".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store(Arc::new(ManualClock::at_millis(7_000))).await;
        let created = store
            .create(form("Tent", Category::Camping), &owner("o1"))
            .await
            .unwrap();

        assert!(created.available);
        assert_eq!(created.created_at.timestamp_millis(), 7_000);

        let fetched = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(store.get(ListingId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_form_is_not_stored() {
        let store = store(Arc::new(ManualClock::at_millis(1))).await;
        let mut bad = form("Kayak", Category::WaterSports);
        bad.price_per_day = -1.0;

        let err = store.create(bad, &owner("o1")).await.unwrap_err();
        assert!(matches!(err, GearError::InvalidInput(_)));
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_and_by_owner_are_newest_first() {
        let clock = Arc::new(ManualClock::at_millis(1_000));
        let store = store(Arc::clone(&clock)).await;

        store.create(form("Tent", Category::Camping), &owner("o1")).await.unwrap();
        clock.advance_millis(1_000);
        store.create(form("Bike", Category::Bicycles), &owner("o2")).await.unwrap();
        clock.advance_millis(1_000);
        store.create(form("Stove", Category::Camping), &owner("o1")).await.unwrap();

        let titles: Vec<_> = store
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, ["Stove", "Bike", "Tent"]);

        let mine: Vec<_> = store
            .list_by_owner(&ParticipantId::new("o1").unwrap())
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(mine, ["Stove", "Tent"]);

        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_available() {
        let store = store(Arc::new(ManualClock::at_millis(1))).await;
        let created = store
            .create(form("Skis", Category::SkisSnowboards), &owner("o1"))
            .await
            .unwrap();

        assert!(store.set_available(created.id, false).await.unwrap());
        assert!(!store.get(created.id).await.unwrap().unwrap().available);
        assert!(!store.set_available(ListingId::new(), false).await.unwrap());
    }
}

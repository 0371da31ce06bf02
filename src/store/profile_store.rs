//! `SQLite` profile store.

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::common::config::GearConfig;
use crate::common::errors::{ChannelError, GearError, GearResult};
use crate::common::ids::ParticipantId;
use crate::session::UserProfile;
use crate::store::{ProfileStore, StoreFuture};

/// `SQLite` implementation of the profile store.
pub struct SqliteProfileStore {
    conn: Connection,
    table: String,
}

impl SqliteProfileStore {
    /// Initialize the profile store.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or database
    /// operations fail.
    pub async fn new(conn: Connection, config: &GearConfig) -> GearResult<Self> {
        config.validate()?;
        let table = config.storage.profiles_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    uid TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    photo_url TEXT,
                    member_since INTEGER NOT NULL
                )"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

impl ProfileStore for SqliteProfileStore {
    fn find_profile(
        &self,
        uid: &ParticipantId,
    ) -> StoreFuture<'_, GearResult<Option<UserProfile>>> {
        let uid = uid.clone();
        Box::pin(async move {
            let table = self.table.clone();
            let key = uid.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT name, photo_url, member_since FROM {table} WHERE uid = ?1"
                            ),
                            rusqlite::params![key],
                            |row| {
                                Ok((
                                    row.get::<_, String>(0)?,
                                    row.get::<_, Option<String>>(1)?,
                                    row.get::<_, i64>(2)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let Some((name, photo_url, member_since)) = row else {
                return Ok(None);
            };
            let member_since = Utc
                .timestamp_millis_opt(member_since)
                .single()
                .ok_or_else(|| {
                    GearError::Channel(ChannelError::CorruptRecord(
                        "invalid member_since".to_string(),
                    ))
                })?;

            Ok(Some(UserProfile {
                uid,
                name,
                photo_url,
                member_since,
            }))
        })
    }

    fn upsert_profile(&self, profile: &UserProfile) -> StoreFuture<'_, GearResult<()>> {
        let profile = profile.clone();
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (uid, name, photo_url, member_since)
                             VALUES (?1, ?2, ?3, ?4)
                             ON CONFLICT(uid) DO UPDATE SET
                                 name = excluded.name,
                                 photo_url = excluded.photo_url"
                        ),
                        rusqlite::params![
                            profile.uid.as_str(),
                            profile.name,
                            profile.photo_url,
                            profile.member_since.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteProfileStore {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteProfileStore::new(conn, &GearConfig::default())
            .await
            .unwrap()
    }

    fn profile(name: &str, since: i64) -> UserProfile {
        UserProfile {
            uid: ParticipantId::new("u1").unwrap(),
            name: name.to_string(),
            photo_url: None,
            member_since: Utc.timestamp_millis_opt(since).single().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let store = store().await;
        let found = store
            .find_profile(&ParticipantId::new("ghost").unwrap())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_member_since() {
        let store = store().await;
        store.upsert_profile(&profile("Ada", 1_000)).await.unwrap();
        store.upsert_profile(&profile("Ada L.", 9_000)).await.unwrap();

        let found = store
            .find_profile(&ParticipantId::new("u1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Ada L.");
        assert_eq!(found.member_since.timestamp_millis(), 1_000);
    }
}

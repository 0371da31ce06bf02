//! `SQLite` message store with live ordered queries.
//!
//! Every append publishes the conversation id on a broadcast channel. A live
//! query is a task that re-reads the ordered set whenever its conversation
//! shows up there, and forwards the result to its subscriber.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::chat::conversation::ConversationId;
use crate::chat::message::{Message, NewMessage};
use crate::common::clock::Clock;
use crate::common::config::GearConfig;
use crate::common::errors::{ChannelError, GearError, GearResult};
use crate::common::ids::{ListingId, MessageId, ParticipantId};
use crate::store::{MessageStore, Snapshot, SnapshotStream, StoreFuture, snapshot_stream};

/// Raw columns of one message row.
type MessageRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
);

/// `SQLite` implementation of message storage.
pub struct SqliteMessageStore {
    conn: Connection,
    table: String,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<ConversationId>,
    snapshot_buffer: usize,
}

impl SqliteMessageStore {
    /// Initialize the store and create the table if it doesn't exist.
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
        let table = config.storage.messages_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    conversation_id TEXT NOT NULL,
                    sender_id TEXT NOT NULL,
                    sender_name TEXT NOT NULL,
                    sender_photo TEXT,
                    body TEXT NOT NULL,
                    item_id TEXT,
                    ts INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_conversation_ts
                    ON {table_name} (conversation_id, ts, seq);"
            ))?;
            Ok(())
        })
        .await?;

        let (changes, _) = broadcast::channel(config.feed.change_buffer);
        Ok(Self {
            conn,
            table,
            clock,
            changes,
            snapshot_buffer: config.feed.snapshot_buffer,
        })
    }

    /// Number of live queries currently listening.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl MessageStore for SqliteMessageStore {
    fn append(
        &self,
        conversation: &ConversationId,
        message: NewMessage,
    ) -> StoreFuture<'_, GearResult<MessageId>> {
        let conversation = conversation.clone();
        Box::pin(async move {
            let table = self.table.clone();
            let id = MessageId::new();
            let id_str = id.to_string();
            let key = conversation.to_string();
            let ts = self.clock.now().timestamp_millis();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table}
                             (id, conversation_id, sender_id, sender_name, sender_photo,
                              body, item_id, ts)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                        ),
                        rusqlite::params![
                            id_str,
                            key,
                            message.sender_id.as_str(),
                            message.sender_name,
                            message.sender_avatar,
                            message.body,
                            message.listing_id.map(|listing| listing.to_string()),
                            ts
                        ],
                    )?;
                    Ok(())
                })
                .await?;

            debug!(%conversation, message = %id, ts, "Appended message");
            // No live query listening is not an error.
            let _ = self.changes.send(conversation);
            Ok(id)
        })
    }

    fn load_ordered(&self, conversation: &ConversationId) -> StoreFuture<'_, GearResult<Snapshot>> {
        let conversation = conversation.clone();
        Box::pin(async move { load_messages(&self.conn, &self.table, &conversation).await })
    }

    fn live_query(
        &self,
        conversation: &ConversationId,
    ) -> StoreFuture<'_, GearResult<SnapshotStream>> {
        let conversation = conversation.clone();
        Box::pin(async move {
            // Subscribe before the first read so no append can slip between them.
            let changes = self.changes.subscribe();
            let (tx, rx) = mpsc::channel(self.snapshot_buffer);
            tokio::spawn(run_live_query(
                self.conn.clone(),
                self.table.clone(),
                conversation,
                changes,
                tx,
            ));
            Ok(snapshot_stream(rx))
        })
    }
}

async fn run_live_query(
    conn: Connection,
    table: String,
    conversation: ConversationId,
    mut changes: broadcast::Receiver<ConversationId>,
    tx: mpsc::Sender<GearResult<Snapshot>>,
) {
    debug!(%conversation, "Live query started");
    loop {
        let snapshot = load_messages(&conn, &table, &conversation).await;
        let failed = snapshot.is_err();
        if let Err(err) = &snapshot {
            warn!(%conversation, %err, "Live query failed");
        }
        if tx.send(snapshot).await.is_err() || failed {
            break;
        }
        match wait_for_change(&mut changes, &conversation, &tx).await {
            Wake::Changed => {}
            Wake::SubscriberGone => break,
            Wake::StoreClosed => {
                warn!(%conversation, "Message store shut down under a live query");
                let closed = ChannelError::Unavailable("message store shut down".to_string());
                let _ = tx.send(Err(closed.into())).await;
                break;
            }
        }
    }
    debug!(%conversation, "Live query stopped");
}

/// Why a live query woke up.
enum Wake {
    Changed,
    SubscriberGone,
    StoreClosed,
}

/// Wait until `conversation` changes, the subscriber goes away or the store
/// is dropped.
async fn wait_for_change(
    changes: &mut broadcast::Receiver<ConversationId>,
    conversation: &ConversationId,
    tx: &mpsc::Sender<GearResult<Snapshot>>,
) -> Wake {
    loop {
        tokio::select! {
            () = tx.closed() => return Wake::SubscriberGone,
            received = changes.recv() => match received {
                Ok(changed) if &changed != conversation => {}
                // A lagged receiver may have missed our conversation; re-read.
                Ok(_) | Err(RecvError::Lagged(_)) => break,
                Err(RecvError::Closed) => return Wake::StoreClosed,
            },
        }
    }

    // Coalesce a burst of writes into a single snapshot.
    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    Wake::Changed
}

async fn load_messages(
    conn: &Connection,
    table: &str,
    conversation: &ConversationId,
) -> GearResult<Snapshot> {
    let table = table.to_string();
    let key = conversation.to_string();
    let rows = conn
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, sender_id, sender_name, sender_photo, body, item_id, ts
                 FROM {table}
                 WHERE conversation_id = ?1
                 ORDER BY ts ASC, seq ASC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![key], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?
                .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
            Ok(rows)
        })
        .await?;

    rows.into_iter()
        .map(|row| decode_message(conversation, row))
        .collect()
}

fn decode_message(conversation: &ConversationId, row: MessageRow) -> GearResult<Message> {
    let (id, sender_id, sender_name, sender_avatar, body, item_id, ts) = row;
    let id = id
        .parse::<MessageId>()
        .map_err(|err| corrupt(format!("invalid message id: {err}")))?;
    let sender_id = ParticipantId::new(sender_id)
        .map_err(|err| corrupt(format!("invalid sender id: {err}")))?;
    let listing_id = item_id
        .map(|raw| raw.parse::<ListingId>())
        .transpose()
        .map_err(|err| corrupt(format!("invalid item id: {err}")))?;
    let created_at = Utc
        .timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| corrupt("invalid timestamp"))?;

    Ok(Message {
        id,
        conversation_id: conversation.clone(),
        sender_id,
        sender_name,
        sender_avatar,
        body,
        listing_id,
        created_at,
    })
}

fn corrupt(reason: impl Into<String>) -> GearError {
    GearError::Channel(ChannelError::CorruptRecord(reason.into()))
}

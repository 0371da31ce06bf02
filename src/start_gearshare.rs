//! Startup helpers for the `gearshare` binary.
//!
//! `gearshare <self_uid> <peer_uid> [message...]` signs in as `self_uid`,
//! optionally sends `message` to `peer_uid`, then prints the conversation.

use std::process::ExitCode;
use std::sync::Arc;

use crate::chat::message::Message;
use crate::chat::{ChatHeader, ConversationChannel, ConversationView, MessageFeed};
use crate::common::clock::Clock;
use crate::common::config::GearConfig;
use crate::common::errors::{ChannelError, GearError, GearResult};
use crate::common::ids::ParticipantId;
use crate::session::{Identity, Session, UserProfile};
use crate::store::{MessageStore, ProfileStore, Snapshot, SqliteBackends};

const USAGE: &str = "usage: gearshare <self_uid> <peer_uid> [message...]";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Participant to act as.
    pub self_id: ParticipantId,
    /// Other side of the conversation.
    pub peer_id: ParticipantId,
    /// Message to send first, if any.
    pub message: Option<String>,
}

impl CliArgs {
    /// Parse arguments, program name excluded.
    ///
    /// # Errors
    /// Returns `InvalidInput` if a participant token is missing or malformed.
    pub fn parse<I>(args: I) -> GearResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut token = || {
            args.next()
                .ok_or_else(|| GearError::invalid(USAGE))
                .and_then(ParticipantId::new)
        };
        let self_id = token()?;
        let peer_id = token()?;
        let words: Vec<String> = args.collect();
        let message = (!words.is_empty()).then(|| words.join(" "));

        Ok(Self {
            self_id,
            peer_id,
            message,
        })
    }
}

/// Run the binary.
///
/// # Returns
/// `ExitCode::SUCCESS` once the conversation is printed, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting gearshare v{}", env!("CARGO_PKG_VERSION"));

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(chat_once(&GearConfig::from_env(), args)) {
        tracing::error!("Chat failed: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Open the stores, send the optional message and print one snapshot.
///
/// # Errors
/// Returns an error if the stores fail or the arguments describe an invalid
/// conversation.
pub async fn chat_once(config: &GearConfig, args: CliArgs) -> GearResult<()> {
    let backends = SqliteBackends::open(config).await?;
    let me = sign_in_identity(
        backends.profiles.as_ref(),
        backends.clock.as_ref(),
        &args.self_id,
    )
    .await?;

    let messages: Arc<dyn MessageStore> = backends.messages.clone();
    let profiles: Arc<dyn ProfileStore> = backends.profiles.clone();
    let session = Session::signed_in(me.clone());
    let channel = ConversationChannel::new(config, session, messages, profiles)?;

    let conversation = channel.conversation_with(&args.peer_id)?;
    if let Some(text) = &args.message {
        channel.send_as_current(&conversation, text, None).await?;
    }

    let header = ChatHeader::for_peer(channel.peer_profile(&args.peer_id).await?.as_ref());
    let mut view = ConversationView::new(conversation.clone(), me.id.clone(), None);
    let mut feed = channel.open_feed(&conversation).await?;
    let snapshot = first_snapshot(&mut feed).await;
    feed.handle().cancel();

    view.apply(Ok(snapshot?));
    print_conversation(&header, &view);
    Ok(())
}

/// First snapshot of `feed`. A feed that ends without one means the store
/// went away.
async fn first_snapshot(feed: &mut MessageFeed) -> GearResult<Snapshot> {
    match feed.next().await {
        Some(update) => update,
        None => Err(ChannelError::Unavailable(format!(
            "feed of {} ended before its first snapshot",
            feed.handle().conversation()
        ))
        .into()),
    }
}

/// Identity for `uid`, registering a profile stamped by `clock` on first use.
async fn sign_in_identity(
    profiles: &dyn ProfileStore,
    clock: &dyn Clock,
    uid: &ParticipantId,
) -> GearResult<Identity> {
    if let Some(profile) = profiles.find_profile(uid).await? {
        let identity = Identity::new(profile.uid, profile.name);
        return Ok(match profile.photo_url {
            Some(photo) => identity.with_avatar(photo),
            None => identity,
        });
    }

    let identity = Identity::new(uid.clone(), uid.as_str());
    profiles
        .upsert_profile(&UserProfile::from_identity(&identity, clock.now()))
        .await?;
    tracing::info!(participant = %uid, "Registered new profile");
    Ok(identity)
}

fn render_line(view: &ConversationView, message: &Message) -> String {
    let who = if view.is_own(message) {
        "you"
    } else {
        message.sender_name.as_str()
    };
    format!("[{}] {who}: {}", message.display_time(), message.body)
}

#[allow(clippy::print_stdout)]
fn print_conversation(header: &ChatHeader, view: &ConversationView) {
    println!("{} ({})", header.name, header.status);
    if view.is_empty() {
        println!("No messages yet.");
    }
    for message in view.messages() {
        println!("{}", render_line(view, message));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use dashmap::DashMap;
    use tokio::sync::mpsc;

    use super::*;
    use crate::chat::SubscriptionHandle;
    use crate::common::clock::ManualClock;
    use crate::common::ids::MessageId;
    use crate::store::snapshot_stream;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    fn scripted_feed() -> (mpsc::Sender<GearResult<Snapshot>>, MessageFeed) {
        let (tx, rx) = mpsc::channel(4);
        let handle = SubscriptionHandle::register(
            1,
            "u1_u2".parse().unwrap(),
            None,
            Arc::new(DashMap::new()),
        );
        (tx, MessageFeed::new(snapshot_stream(rx), handle))
    }

    #[test]
    fn test_parse_with_message() {
        let args =
            CliArgs::parse(strings(&["u1", "u2", "Is", "this", "still", "available?"])).unwrap();
        assert_eq!(args.self_id.as_str(), "u1");
        assert_eq!(args.peer_id.as_str(), "u2");
        assert_eq!(args.message.as_deref(), Some("Is this still available?"));
    }

    #[test]
    fn test_parse_rejects_missing_or_bad_tokens() {
        assert!(CliArgs::parse(strings(&["u1"])).is_err());
        assert!(CliArgs::parse(strings(&["u_1", "u2"])).is_err());
        assert!(CliArgs::parse(strings(&["u1", "u2"])).unwrap().message.is_none());
    }

    #[test]
    fn test_render_line_marks_own_messages() {
        let me = ParticipantId::new("u1").unwrap();
        let view = ConversationView::new("u1_u2".parse().unwrap(), me.clone(), None);
        let message = Message {
            id: MessageId::new(),
            conversation_id: "u1_u2".parse().unwrap(),
            sender_id: me,
            sender_name: "Una".to_string(),
            sender_avatar: None,
            body: "hello".to_string(),
            listing_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 10, 5, 15, 7, 0).unwrap(),
        };
        assert_eq!(render_line(&view, &message), "[Oct 5, 3:07 PM] you: hello");
    }

    #[tokio::test]
    async fn test_first_snapshot_keeps_store_error() {
        let (tx, mut feed) = scripted_feed();
        tx.send(Err(ChannelError::PermissionDenied("rules".to_string()).into()))
            .await
            .unwrap();

        let err = first_snapshot(&mut feed).await.unwrap_err();
        assert!(matches!(err, GearError::Channel(ChannelError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_first_snapshot_of_closed_feed_is_unavailable() {
        let (tx, mut feed) = scripted_feed();
        drop(tx);

        let err = first_snapshot(&mut feed).await.unwrap_err();
        assert!(matches!(err, GearError::Channel(ChannelError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_first_sign_in_registers_profile() {
        let config = GearConfig::default();
        let clock = Arc::new(ManualClock::at_millis(86_400_000));
        let backends = SqliteBackends::in_memory(&config, clock).await.unwrap();
        let uid = ParticipantId::new("u9").unwrap();

        let identity =
            sign_in_identity(backends.profiles.as_ref(), backends.clock.as_ref(), &uid)
                .await
                .unwrap();
        assert_eq!(identity.display_name, "u9");

        let profile = backends.profiles.find_profile(&uid).await.unwrap().unwrap();
        assert_eq!(profile.member_since.timestamp_millis(), 86_400_000);
    }
}

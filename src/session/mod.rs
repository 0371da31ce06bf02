//! Observable sign-in state.
//!
//! The session is passed explicitly to whatever needs "who is signed in";
//! nothing in the crate reads ambient global auth state.

pub mod profile;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::common::errors::{GearError, GearResult};
use crate::common::ids::ParticipantId;

pub use profile::UserProfile;

/// The signed-in participant as seen by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Participant token.
    pub id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Avatar reference, if any.
    pub avatar: Option<String>,
}

impl Identity {
    /// Build an identity without an avatar.
    #[must_use]
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar: None,
        }
    }

    /// Attach an avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Shared, observable sign-in state. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct Session {
    state: Arc<watch::Sender<Option<Identity>>>,
}

impl Session {
    /// A session with nobody signed in.
    #[must_use]
    pub fn signed_out() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// A session fixed to `identity` at construction.
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        let (state, _) = watch::channel(Some(identity));
        Self {
            state: Arc::new(state),
        }
    }

    /// Record a sign-in, replacing any current identity.
    pub fn sign_in(&self, identity: Identity) {
        info!(participant = %identity.id, "Signed in");
        self.state.send_replace(Some(identity));
    }

    /// Record a sign-out.
    pub fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!(participant = %previous.id, "Signed out");
        }
    }

    /// Snapshot of the current identity.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    /// The current identity, or `InvalidInput` when signed out.
    ///
    /// # Errors
    /// Returns an error if nobody is signed in.
    pub fn require_current(&self) -> GearResult<Identity> {
        self.current()
            .ok_or_else(|| GearError::invalid("no participant is signed in"))
    }

    /// Observe sign-in changes, starting with the current state.
    #[must_use]
    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            rx: self.state.subscribe(),
            primed: false,
        }
    }
}

/// Stream of sign-in states for one observer.
#[derive(Debug)]
pub struct SessionWatch {
    rx: watch::Receiver<Option<Identity>>,
    primed: bool,
}

impl SessionWatch {
    /// Next sign-in state.
    ///
    /// The first call resolves immediately with the current state. Later calls
    /// wait for a change; several quick changes may surface as the latest one.
    /// Returns `None` once every [`Session`] clone is dropped.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new(ParticipantId::new("alice").unwrap(), "Alice")
    }

    #[test]
    fn test_require_current_when_signed_out() {
        let session = Session::signed_out();
        assert!(matches!(session.require_current(), Err(GearError::InvalidInput(_))));
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::signed_out();
        let other = session.clone();
        session.sign_in(alice());
        assert_eq!(other.current(), Some(alice()));
        other.sign_out();
        assert_eq!(session.current(), None);
    }

    #[tokio::test]
    async fn test_watch_fires_with_current_then_changes() {
        let session = Session::signed_in(alice());
        let mut watch = session.watch();

        assert_eq!(watch.next().await, Some(Some(alice())));

        session.sign_out();
        assert_eq!(watch.next().await, Some(None));

        session.sign_in(alice());
        assert_eq!(watch.next().await, Some(Some(alice())));
    }

    #[tokio::test]
    async fn test_watch_ends_when_session_dropped() {
        let session = Session::signed_out();
        let mut watch = session.watch();
        assert_eq!(watch.next().await, Some(None));
        drop(session);
        assert_eq!(watch.next().await, None);
    }
}

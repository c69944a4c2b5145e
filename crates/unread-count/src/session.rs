//! Session model supplied by the authentication layer.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The authenticated identity of the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Authentication snapshot: who is signed in, and whether that is still being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Option<Principal>,
    pub loading: bool,
}

impl Session {
    /// Session still being resolved (initial state of most auth providers).
    pub fn loading() -> Self {
        Self {
            principal: None,
            loading: true,
        }
    }

    /// Resolved, nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolved and signed in.
    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            loading: false,
        }
    }

    /// The principal, but only once loading has finished.
    pub fn ready_principal(&self) -> Option<&Principal> {
        if self.loading {
            None
        } else {
            self.principal.as_ref()
        }
    }

    /// True when the session is authenticated and not loading.
    pub fn is_ready(&self) -> bool {
        self.ready_principal().is_some()
    }

    /// Identity of the session for change detection; email edits do not count.
    pub(crate) fn key(&self) -> (Option<String>, bool) {
        (self.principal.as_ref().map(|p| p.id.clone()), self.loading)
    }
}

/// Create a session channel starting in the loading state.
pub fn session_channel() -> (watch::Sender<Session>, watch::Receiver<Session>) {
    watch::channel(Session::loading())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_principal_requires_not_loading() {
        let mut session = Session::authenticated(Principal::new("u1"));
        assert_eq!(session.ready_principal().map(|p| p.id.as_str()), Some("u1"));

        session.loading = true;
        assert!(session.ready_principal().is_none());
        assert!(!session.is_ready());
    }

    #[test]
    fn test_anonymous_and_loading_are_not_ready() {
        assert!(!Session::anonymous().is_ready());
        assert!(!Session::loading().is_ready());
        assert!(Session::default() == Session::anonymous());
    }

    #[test]
    fn test_key_ignores_email() {
        let a = Session::authenticated(Principal::new("u1"));
        let b = Session::authenticated(Principal::new("u1").with_email("u1@example.com"));
        let c = Session::authenticated(Principal::new("u2"));

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_ne!(a.key(), Session::loading().key());
    }

    #[test]
    fn test_session_channel_starts_loading() {
        let (_tx, rx) = session_channel();
        assert_eq!(*rx.borrow(), Session::loading());
    }
}

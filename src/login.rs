use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DatavisError, Result};
use crate::storage::KeyValueStore;

#[cfg(feature = "web")]
use std::collections::HashMap;
#[cfg(feature = "web")]
use std::time::{Duration, SystemTime};
#[cfg(feature = "web")]
use uuid::Uuid;

/// Key of the signed-in user record in the ephemeral store
pub const USER_KEY: &str = "datavis-user";

/// Opaque per-user scoping token
///
/// Usually an email address. Nothing is verified beyond the token being
/// non-empty; it only namespaces persisted records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    email: String,
}

impl Identity {
    /// # Errors
    /// * Returns `InvalidIdentity` for an empty or blank token
    pub fn new(email: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DatavisError::InvalidIdentity(email.to_string()));
        }
        Ok(Self {
            email: email.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

/// Sign-in state held in a session-scoped store
///
/// The record under [`USER_KEY`] is `{"email": "..."}`. There is no
/// credential check: login and signup both just remember the email.
pub struct AuthSession<S> {
    store: S,
    user: Option<Identity>,
}

impl<S: KeyValueStore> AuthSession<S> {
    /// Pick up whoever was signed in before a reload
    ///
    /// A record that does not parse is removed and nobody is signed in.
    pub fn restore(mut store: S) -> Result<Self> {
        let user = match store.get(USER_KEY)? {
            None => None,
            Some(raw) => match serde_json::from_str::<Identity>(&raw) {
                Ok(stored) => Identity::new(stored.email()).ok(),
                Err(e) => {
                    warn!("removing unreadable sign-in record: {}", e);
                    store.remove(USER_KEY)?;
                    None
                }
            },
        };
        Ok(Self { store, user })
    }

    pub fn current(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn login(&mut self, email: &str) -> Result<Identity> {
        let identity = Identity::new(email)?;
        self.store
            .set(USER_KEY, &serde_json::to_string(&identity)?)?;
        debug!("signed in {}", identity);
        self.user = Some(identity.clone());
        Ok(identity)
    }

    /// Same as [`AuthSession::login`]; there are no accounts to create
    pub fn signup(&mut self, email: &str) -> Result<Identity> {
        self.login(email)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.store.remove(USER_KEY)?;
        if let Some(user) = self.user.take() {
            debug!("signed out {}", user);
        }
        Ok(())
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

// Web session table below (only compiled with "web" feature)

#[cfg(feature = "web")]
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// A browser session bound to an identity
#[cfg(feature = "web")]
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub expires_at: SystemTime,
}

/// Cookie token -> session map for the web server
#[cfg(feature = "web")]
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

#[cfg(feature = "web")]
impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and return its token
    pub fn create(&mut self, identity: Identity) -> String {
        let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);
        self.create_until(identity, expires_at)
    }

    /// Create a session that ends at `expires_at`
    pub fn create_until(&mut self, identity: Identity, expires_at: SystemTime) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                identity,
                expires_at,
            },
        );
        token
    }

    /// Identity of a live session, dropping it if it has expired
    pub fn validate(&mut self, token: &str) -> Option<Identity> {
        match self.sessions.get(token) {
            Some(session) if session.expires_at > SystemTime::now() => {
                Some(session.identity.clone())
            }
            Some(_) => {
                self.sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn end(&mut self, token: &str) -> Option<Identity> {
        self.sessions.remove(token).map(|s| s.identity)
    }

    /// Drop every expired session and return their tokens
    pub fn sweep(&mut self) -> Vec<String> {
        let now = SystemTime::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            self.sessions.remove(token);
        }
        if !expired.is_empty() {
            debug!("dropped {} expired sessions", expired.len());
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

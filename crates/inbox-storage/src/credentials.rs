//! High-level API for the stored session credential.

use crate::{SecureStorage, StorageKeys, StorageResult};

/// Session credential as persisted by `login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub token: String,
    pub email: Option<String>,
}

/// Synchronous access to the stored session token.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    /// Create a new credential store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Read the stored session token, if any.
    pub fn session_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::SESSION_TOKEN)
    }

    /// Read the stored principal id, if any.
    pub fn user_id(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::SESSION_USER_ID)
    }

    /// Read the complete stored session. Both token and user id must be present.
    pub fn stored_session(&self) -> StorageResult<Option<StoredSession>> {
        let (Some(user_id), Some(token)) = (self.user_id()?, self.session_token()?) else {
            return Ok(None);
        };

        Ok(Some(StoredSession {
            user_id,
            token,
            email: self.storage.get(StorageKeys::SESSION_EMAIL)?,
        }))
    }

    /// Store a session credential, replacing any previous one.
    pub fn set_session(&self, user_id: &str, token: &str, email: Option<&str>) -> StorageResult<()> {
        self.storage.set(StorageKeys::SESSION_USER_ID, user_id)?;
        self.storage.set(StorageKeys::SESSION_TOKEN, token)?;
        match email {
            Some(email) => self.storage.set(StorageKeys::SESSION_EMAIL, email)?,
            None => {
                self.storage.delete(StorageKeys::SESSION_EMAIL)?;
            }
        }
        tracing::debug!(user_id, "Stored session credential");
        Ok(())
    }

    /// Remove the stored session. Returns whether a token was present.
    pub fn clear_session(&self) -> StorageResult<bool> {
        let had_token = self.storage.delete(StorageKeys::SESSION_TOKEN)?;
        self.storage.delete(StorageKeys::SESSION_USER_ID)?;
        self.storage.delete(StorageKeys::SESSION_EMAIL)?;
        tracing::debug!(had_token, "Cleared session credential");
        Ok(had_token)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

//! Persisted login state.
//!
//! The token and the user record live under fixed keys in a [`Storage`]; the
//! session is authenticated exactly when both are present and readable.

use serde::{Deserialize, Serialize};

use crate::domain::model::User;
use crate::domain::ports::Storage;
use crate::utils::error::{PracticeError, Result};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";
pub const API_KEY_KEY: &str = "openaiApiKey";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub user: User,
}

pub struct AuthSession<S: Storage> {
    storage: S,
    token: Option<String>,
    user: Option<User>,
}

impl<S: Storage> AuthSession<S> {
    /// A logged-out session that has not looked at storage yet.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            token: None,
            user: None,
        }
    }

    /// Load whatever a previous run left behind. A token without a parseable
    /// user (or the reverse) is treated as logged out and cleared.
    pub async fn restore(storage: S) -> Result<Self> {
        let mut session = Self::new(storage);

        let token = session
            .storage
            .read_file(TOKEN_KEY)
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|t| !t.trim().is_empty());
        let user = match session.storage.read_file(USER_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<User>(&bytes) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Stored user record is unreadable, clearing session: {}", e);
                    None
                }
            },
            None => None,
        };

        match (token, user) {
            (Some(token), Some(user)) => {
                tracing::debug!("Restored session for {}", user.email);
                session.token = Some(token);
                session.user = Some(user);
            }
            (None, None) => {}
            _ => session.clear_storage().await?,
        }

        Ok(session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user
            .as_ref()
            .filter(|_| self.token.is_some())
            .ok_or_else(|| PracticeError::session("no active session"))
    }

    pub async fn login(&mut self, data: LoginData) -> Result<()> {
        let user_json = serde_json::to_vec(&data.user)?;
        self.storage.write_file(TOKEN_KEY, data.token.as_bytes()).await?;
        self.storage.write_file(USER_KEY, &user_json).await?;

        tracing::info!("Logged in as {}", data.user.email);
        self.token = Some(data.token);
        self.user = Some(data.user);
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.clear_storage().await?;
        if let Some(user) = self.user.take() {
            tracing::info!("Logged out {}", user.email);
        }
        self.token = None;
        Ok(())
    }

    pub async fn update_user(&mut self, user: User) -> Result<()> {
        if !self.is_authenticated() {
            return Err(PracticeError::session("cannot update the user of a logged-out session"));
        }
        let user_json = serde_json::to_vec(&user)?;
        self.storage.write_file(USER_KEY, &user_json).await?;
        self.user = Some(user);
        Ok(())
    }

    pub async fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            self.storage.remove_file(API_KEY_KEY).await
        } else {
            self.storage.write_file(API_KEY_KEY, key.as_bytes()).await
        }
    }

    /// The stored third-party API key, if the user configured one.
    pub async fn api_key(&self) -> Result<Option<String>> {
        Ok(self
            .storage
            .read_file(API_KEY_KEY)
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|k| !k.is_empty()))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn clear_storage(&self) -> Result<()> {
        self.storage.remove_file(TOKEN_KEY).await?;
        self.storage.remove_file(USER_KEY).await
    }
}

//! The signed-in identity and its bearer token.
//!
//! All parsing of the persisted session happens here. Reads always go to
//! storage so a logout or a new login is seen by the next request.

use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::common::Role;
use crate::error::{ChatError, Result};
use crate::network::DocumentKey;
use crate::storage::{LocalStore, ensure_parent_dir};

pub const AUTH_KEY: &str = "auth";
const LEGACY_TOKEN_KEY: &str = "token";
const LEGACY_USER_KEY: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredIdentity")]
pub struct Identity {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Stored user blobs may carry `_id`, `id`, or both.
#[derive(Deserialize)]
struct StoredIdentity {
    #[serde(flatten)]
    id: DocumentKey,
    role: Role,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<StoredIdentity> for Identity {
    fn from(stored: StoredIdentity) -> Self {
        Identity {
            id: stored.id.into_string(),
            role: stored.role,
            name: stored.name,
            email: stored.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: String,
    pub user: Identity,
}

pub struct Session {
    store: Mutex<LocalStore>,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        Ok(Self {
            store: Mutex::new(LocalStore::open(path)?),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            store: Mutex::new(LocalStore::in_memory()?),
        })
    }

    fn with_store<T>(&self, f: impl FnOnce(&LocalStore) -> Result<T>) -> Result<T> {
        let store = self
            .store
            .lock()
            .map_err(|_| std::io::Error::other("session store lock poisoned"))?;
        f(&store)
    }

    /// Reads the persisted session, accepting the canonical `auth` blob or the
    /// legacy separate `token` and `user` keys.
    pub fn current(&self) -> Result<Option<AuthState>> {
        self.with_store(|store| {
            if let Some(raw) = store.get(AUTH_KEY)? {
                match serde_json::from_str::<AuthState>(&raw) {
                    Ok(state) if !state.token.is_empty() => return Ok(Some(state)),
                    Ok(_) => {}
                    Err(err) => log::warn!("Ignoring unreadable `{AUTH_KEY}` entry: {err}"),
                }
            }

            let (Some(raw_token), Some(raw_user)) =
                (store.get(LEGACY_TOKEN_KEY)?, store.get(LEGACY_USER_KEY)?)
            else {
                return Ok(None);
            };

            let token = serde_json::from_str::<String>(&raw_token).unwrap_or(raw_token);
            if token.is_empty() {
                return Ok(None);
            }
            match serde_json::from_str::<Identity>(&raw_user) {
                Ok(user) => Ok(Some(AuthState { token, user })),
                Err(err) => {
                    log::warn!("Ignoring unreadable `{LEGACY_USER_KEY}` entry: {err}");
                    Ok(None)
                }
            }
        })
    }

    pub fn bearer_token(&self) -> Result<Option<String>> {
        Ok(self.current()?.map(|state| state.token))
    }

    pub fn identity(&self) -> Result<Option<Identity>> {
        Ok(self.current()?.map(|state| state.user))
    }

    /// Like [`Session::identity`], but a missing session is an [`ChatError::Auth`].
    pub fn require_identity(&self) -> Result<Identity> {
        self.identity()?.ok_or(ChatError::Auth)
    }

    pub fn save(&self, state: &AuthState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.with_store(|store| {
            store.set(AUTH_KEY, &json)?;
            store.remove(LEGACY_TOKEN_KEY)?;
            store.remove(LEGACY_USER_KEY)?;
            Ok(())
        })?;
        log::info!(
            "Session saved for {} ({}), token {}",
            state.user.id,
            state.user.role.as_str(),
            mask_token(&state.token)
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.with_store(|store| {
            store.remove(AUTH_KEY)?;
            store.remove(LEGACY_TOKEN_KEY)?;
            store.remove(LEGACY_USER_KEY)?;
            Ok(())
        })
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.with_store(|store| Ok(store.set(key, value)?))
    }
}

/// Masks a token for logging: first 4 characters followed by `***`.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "***".to_string();
    }
    let head: String = token.chars().take(4).collect();
    format!("{head}***")
}

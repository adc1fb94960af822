//! Session persistence consumed by the client.
//!
//! Login and logout flows own the store's contents; the client only reads the
//! bearer token and the signed-in user's identity.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Well-known session keys.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const USER_ID: &str = "userId";
    pub const ROLE: &str = "role";
    pub const USER_NAME: &str = "userName";
}

/// String key-value store holding the session (browser `localStorage`,
/// a keychain entry, or memory).
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-process [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a bearer token.
    pub fn with_token(token: impl AsRef<str>) -> Self {
        let store = Self::new();
        store.set(keys::TOKEN, token.as_ref());
        store
    }
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        f.debug_struct("MemorySessionStore")
            .field("keys", &names)
            .finish()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// CRM role of the signed-in user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Admin")]
    Admin,
    #[serde(alias = "Manager")]
    Manager,
    #[serde(alias = "Employee")]
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Identity of the signed-in user as recorded in the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
    pub name: Option<String>,
}

impl SessionUser {
    /// Reads the user from `store`. Returns `None` when the id or role is
    /// missing, blank, or the role is not recognized.
    pub fn from_store(store: &dyn SessionStore) -> Option<Self> {
        let id = store.get(keys::USER_ID).filter(|id| !id.trim().is_empty())?;
        let role = store.get(keys::ROLE)?.parse().ok()?;
        Some(Self {
            id,
            role,
            name: store.get(keys::USER_NAME),
        })
    }
}

/// Builds the `Authorization` value for a stored token.
///
/// If the token is missing the `Bearer ` prefix, it is added automatically.
pub(crate) fn bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::{bearer_authorization, keys, MemorySessionStore, Role, SessionStore, SessionUser};

    #[test]
    fn bearer_adds_prefix_when_missing() {
        assert_eq!(bearer_authorization("abc123"), "Bearer abc123".to_owned());
    }

    #[test]
    fn bearer_keeps_existing_prefix() {
        assert_eq!(bearer_authorization("bEaReR abc123"), "bEaReR abc123".to_owned());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::with_token("t0k");
        assert_eq!(store.get(keys::TOKEN).as_deref(), Some("t0k"));
        store.remove(keys::TOKEN);
        assert_eq!(store.get(keys::TOKEN), None);
    }

    #[test]
    fn debug_lists_keys_but_not_values() {
        let store = MemorySessionStore::with_token("secret-token");
        let debug = format!("{store:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Manager".parse::<Role>(), Ok(Role::Manager));
        assert_eq!(" employee ".parse::<Role>(), Ok(Role::Employee));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn session_user_requires_id_and_role() {
        let store = MemorySessionStore::new();
        assert_eq!(SessionUser::from_store(&store), None);

        store.set(keys::USER_ID, "u-1");
        assert_eq!(SessionUser::from_store(&store), None);

        store.set(keys::ROLE, "admin");
        store.set(keys::USER_NAME, "Dana");
        assert_eq!(
            SessionUser::from_store(&store),
            Some(SessionUser {
                id: "u-1".to_owned(),
                role: Role::Admin,
                name: Some("Dana".to_owned()),
            })
        );
    }
}

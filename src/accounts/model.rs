//! Account records and the input value objects accepted by the service.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};
use utoipa::ToSchema;

/// Store-assigned surrogate key. Never changes and is never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = i64)]
pub struct AccountId(i64);

impl AccountId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

/// A persisted account.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("email", &self.email)
            .finish()
    }
}

/// Row to insert; `password_hash` is already the hasher output.
#[derive(Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("email", &self.email)
            .finish()
    }
}

/// Fields to change on an existing account. `None` leaves the field as is.
#[derive(Clone, Default)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

impl AccountPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password_hash.is_none()
    }

    /// Apply the patch to a copy of `account`, returning the updated copy.
    #[must_use]
    pub fn apply(&self, account: &Account) -> Account {
        let mut updated = account.clone();
        if let Some(username) = &self.username {
            updated.username.clone_from(username);
        }
        if let Some(password_hash) = &self.password_hash {
            updated.password_hash.clone_from(password_hash);
        }
        updated
    }

    /// True when the patch asks for a username other than `current`.
    #[must_use]
    pub fn renames(&self, current: &str) -> bool {
        self.username
            .as_deref()
            .is_some_and(|username| username != current)
    }
}

impl fmt::Debug for AccountPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountPatch")
            .field("username", &self.username)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// Registration request as received from the gateway.
#[derive(Debug)]
pub struct RegisterInput {
    pub username: String,
    pub password: SecretString,
    pub repeat_password: SecretString,
    pub email: String,
}

/// Login credentials.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Requested account changes, plaintext password included.
#[derive(Debug, Default)]
pub struct UpdateInput {
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

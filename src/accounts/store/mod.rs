//! Transactional persistence for accounts.
//!
//! Every operation runs inside its own transaction scope: it either commits
//! as a whole or leaves the store untouched. Username uniqueness is checked
//! and enforced inside that scope, so a check-then-insert race cannot create
//! two accounts with the same username.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryAccountStore;
pub use self::postgres::PgAccountStore;

use crate::accounts::model::{Account, AccountId, AccountPatch, NewAccount};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("username already taken")]
    UsernameTaken,
    #[error("account store unavailable")]
    Backend(#[source] anyhow::Error),
}

impl StoreError {
    /// Wrap an infrastructure error with what the store was doing.
    pub fn backend<E>(err: E, context: &'static str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(anyhow::Error::new(err).context(context))
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert `account` unless its username is already held; returns the new id.
    async fn create_if_username_free(&self, account: NewAccount) -> Result<AccountId, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Exact, case-sensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError>;

    /// Re-read the account inside the transaction, check a rename against
    /// every other account and apply `patch`. Nothing is written on failure.
    async fn update_with_conflict_check(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<(), StoreError>;

    async fn delete(&self, id: AccountId) -> Result<(), StoreError>;

    /// Cheap reachability check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

//! In-memory account store for tests and local development.
//!
//! A single write lock serialises mutations. Each mutation works on a staged
//! copy of the state and swaps it in only when the whole operation succeeded,
//! which gives the same all-or-nothing behaviour as a database transaction.

use super::{AccountStore, StoreError};
use crate::accounts::model::{Account, AccountId, AccountPatch, NewAccount};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    // Monotonic; ids are not reused after delete.
    last_id: i64,
    accounts: BTreeMap<AccountId, Account>,
    by_username: HashMap<String, AccountId>,
}

impl MemoryState {
    fn username_holder(&self, username: &str) -> Option<AccountId> {
        self.by_username.get(username).copied()
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    state: RwLock<MemoryState>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run `operation` against a staged copy; commit it only on `Ok`.
    async fn transaction<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut MemoryState) -> Result<T, StoreError>,
    {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let value = operation(&mut staged)?;
        *state = staged;
        Ok(value)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    #[instrument(skip(self))]
    async fn create_if_username_free(&self, account: NewAccount) -> Result<AccountId, StoreError> {
        self.transaction(|state| {
            if state.username_holder(&account.username).is_some() {
                debug!("username already held");
                return Err(StoreError::UsernameTaken);
            }

            state.last_id += 1;
            let id = AccountId::new(state.last_id);
            state.by_username.insert(account.username.clone(), id);
            state.accounts.insert(
                id,
                Account {
                    id,
                    username: account.username,
                    password_hash: account.password_hash,
                    email: account.email,
                },
            );
            Ok(id)
        })
        .await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        self.state
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError> {
        let state = self.state.read().await;
        state
            .username_holder(username)
            .and_then(|id| state.accounts.get(&id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn update_with_conflict_check(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<(), StoreError> {
        self.transaction(|state| {
            let current = state.accounts.get(&id).ok_or(StoreError::NotFound)?;
            if patch.is_empty() {
                return Ok(());
            }

            if patch.renames(&current.username) {
                let wanted = patch.username.as_deref().unwrap_or_default();
                if state.username_holder(wanted).is_some_and(|holder| holder != id) {
                    return Err(StoreError::UsernameTaken);
                }
            }

            let updated = patch.apply(current);
            if updated.username != current.username {
                state.by_username.remove(&current.username);
                state.by_username.insert(updated.username.clone(), id);
            }
            state.accounts.insert(id, updated);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        self.transaction(|state| {
            let removed = state.accounts.remove(&id).ok_or(StoreError::NotFound)?;
            state.by_username.remove(&removed.username);
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password_hash: format!("$argon2id$stub${username}"),
            email: format!("{username}@x.com"),
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let first = store.create_if_username_free(new_account("alice")).await?;
        let second = store.create_if_username_free(new_account("bob")).await?;
        assert!(second > first);
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_taken_username() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        store.create_if_username_free(new_account("alice")).await?;
        let result = store.create_if_username_free(new_account("alice")).await;
        assert!(matches!(result, Err(StoreError::UsernameTaken)));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        store.create_if_username_free(new_account("alice")).await?;
        store.create_if_username_free(new_account("Alice")).await?;
        assert!(matches!(
            store.find_by_username("ALICE").await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_winner() {
        let store = Arc::new(MemoryAccountStore::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.create_if_username_free(new_account("carol")).await
            }));
        }

        let mut created = 0;
        let mut taken = 0;
        for task in tasks {
            match task.await {
                Ok(Ok(_)) => created += 1,
                Ok(Err(StoreError::UsernameTaken)) => taken += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(taken, 15);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let first = store.create_if_username_free(new_account("dave")).await?;
        store.delete(first).await?;
        let second = store.create_if_username_free(new_account("dave")).await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn rename_conflict_leaves_account_untouched() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let alice = store.create_if_username_free(new_account("alice")).await?;
        store.create_if_username_free(new_account("bob")).await?;
        let before = store.find_by_id(alice).await?;

        let patch = AccountPatch {
            username: Some("bob".to_string()),
            password_hash: Some("$argon2id$new".to_string()),
        };
        let result = store.update_with_conflict_check(alice, patch).await;
        assert!(matches!(result, Err(StoreError::UsernameTaken)));
        assert_eq!(store.find_by_id(alice).await?, before);
        assert_eq!(store.find_by_username("alice").await?.id, alice);
        Ok(())
    }

    #[tokio::test]
    async fn rename_moves_the_username_index() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let id = store.create_if_username_free(new_account("erin")).await?;
        let patch = AccountPatch {
            username: Some("erin2".to_string()),
            password_hash: None,
        };
        store.update_with_conflict_check(id, patch).await?;

        assert!(matches!(
            store.find_by_username("erin").await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(store.find_by_username("erin2").await?.id, id);

        // The old name is free again.
        store.create_if_username_free(new_account("erin")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn rename_to_own_username_is_not_a_conflict() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let id = store.create_if_username_free(new_account("frank")).await?;
        let patch = AccountPatch {
            username: Some("frank".to_string()),
            password_hash: None,
        };
        store.update_with_conflict_check(id, patch).await?;
        Ok(())
    }

    #[tokio::test]
    async fn empty_patch_leaves_account_untouched() -> Result<(), StoreError> {
        let store = MemoryAccountStore::new();
        let id = store.create_if_username_free(new_account("alice")).await?;
        let before = store.find_by_id(id).await?;

        store
            .update_with_conflict_check(id, AccountPatch::default())
            .await?;
        assert_eq!(store.find_by_id(id).await?, before);
        assert_eq!(store.find_by_username("alice").await?.id, id);
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete_missing_account() {
        let store = MemoryAccountStore::new();
        let missing = AccountId::new(99);
        assert!(matches!(
            store
                .update_with_conflict_check(missing, AccountPatch::default())
                .await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete(missing).await,
            Err(StoreError::NotFound)
        ));
    }
}

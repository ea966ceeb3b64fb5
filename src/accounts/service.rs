//! Account use cases.
//!
//! The service validates input, moves password hashing onto the blocking
//! pool and maps store outcomes onto [`AccountError`]. It keeps no mutable
//! state of its own; the store is the only shared resource.

use super::{
    error::{AccountError, ValidationKind},
    hasher::CredentialHasher,
    model::{Account, AccountId, AccountPatch, Credentials, NewAccount, RegisterInput, UpdateInput},
    store::{AccountStore, StoreError},
};
use crate::token::{IssuedToken, TokenIssuer};
use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument};

// Verified against when the username is unknown, so a miss costs about as
// much as a wrong password.
const DUMMY_PASSWORD: &str = "accountd-dummy-password";

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
    dummy_hash: String,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    /// # Errors
    /// Returns an error if the placeholder hash used for unknown usernames
    /// cannot be computed.
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: CredentialHasher,
        tokens: TokenIssuer,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash(DUMMY_PASSWORD)
            .context("failed to compute placeholder hash")?;
        Ok(Self {
            store,
            hasher,
            tokens,
            dummy_hash,
        })
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Validate, hash and persist a new account.
    ///
    /// Checks run in order (username, password, repeated password, email)
    /// and the first failure is returned before the store is touched.
    ///
    /// # Errors
    /// [`AccountError::Validation`], [`AccountError::UsernameTaken`] or an
    /// infrastructure error.
    #[instrument(skip_all, fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> Result<AccountId, AccountError> {
        let RegisterInput {
            username,
            password,
            repeat_password,
            email,
        } = input;

        if username.is_empty() {
            return Err(ValidationKind::EmptyUsername.into());
        }
        if password.expose_secret().is_empty() {
            return Err(ValidationKind::EmptyPassword.into());
        }
        if password.expose_secret() != repeat_password.expose_secret() {
            return Err(ValidationKind::PasswordMismatch.into());
        }
        if email.is_empty() {
            return Err(ValidationKind::EmptyEmail.into());
        }

        let password_hash = self.hash_password(password).await?;
        let id = self
            .store
            .create_if_username_free(NewAccount {
                username,
                password_hash,
                email,
            })
            .await?;

        info!(account_id = %id, "account registered");
        Ok(id)
    }

    /// Check a username and password.
    ///
    /// An unknown username and a wrong password both yield
    /// [`AccountError::InvalidCredentials`].
    ///
    /// # Errors
    /// [`AccountError::Validation`], [`AccountError::InvalidCredentials`] or
    /// an infrastructure error.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: Credentials) -> Result<Account, AccountError> {
        let Credentials { username, password } = credentials;

        if username.is_empty() {
            return Err(ValidationKind::EmptyUsername.into());
        }
        if password.expose_secret().is_empty() {
            return Err(ValidationKind::EmptyPassword.into());
        }

        let account = match self.store.find_by_username(&username).await {
            Ok(account) => Some(account),
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };

        let stored_hash = account
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |a| a.password_hash.clone());
        let matches = self.verify_password(password, stored_hash).await?;

        match account {
            Some(account) if matches => Ok(account),
            _ => {
                debug!("login rejected");
                Err(AccountError::InvalidCredentials)
            }
        }
    }

    /// Authenticate and mint an access token for the account.
    ///
    /// # Errors
    /// Everything [`Self::authenticate`] returns, plus
    /// [`AccountError::Token`] if signing fails.
    pub async fn authenticate_and_issue_token(
        &self,
        credentials: Credentials,
    ) -> Result<(Account, IssuedToken), AccountError> {
        let account = self.authenticate(credentials).await?;
        let token = self.tokens.issue(account.id).map_err(AccountError::Token)?;
        info!(account_id = %account.id, "access token issued");
        Ok((account, token))
    }

    /// # Errors
    /// [`AccountError::NotFound`] or a store error.
    pub async fn find_account(&self, id: AccountId) -> Result<Account, AccountError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Rename the account and/or rotate its password.
    ///
    /// A new password is hashed before the store is called. An update that
    /// sets neither field still checks that the account exists.
    ///
    /// # Errors
    /// [`AccountError::Validation`] for empty values,
    /// [`AccountError::NotFound`], [`AccountError::UsernameTaken`] or an
    /// infrastructure error.
    #[instrument(skip(self, input), fields(account_id = %id))]
    pub async fn update_account(&self, id: AccountId, input: UpdateInput) -> Result<(), AccountError> {
        let UpdateInput { username, password } = input;

        if username.as_deref().is_some_and(str::is_empty) {
            return Err(ValidationKind::EmptyUsername.into());
        }
        if password
            .as_ref()
            .is_some_and(|password| password.expose_secret().is_empty())
        {
            return Err(ValidationKind::EmptyPassword.into());
        }

        let password_hash = match password {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let patch = AccountPatch {
            username,
            password_hash,
        };
        self.store.update_with_conflict_check(id, patch).await?;

        info!("account updated");
        Ok(())
    }

    /// # Errors
    /// [`AccountError::NotFound`] or a store error.
    #[instrument(skip(self), fields(account_id = %id))]
    pub async fn delete_account(&self, id: AccountId) -> Result<(), AccountError> {
        self.store.delete(id).await?;
        info!("account deleted");
        Ok(())
    }

    /// Liveness of the backing store.
    ///
    /// # Errors
    /// Returns the store error if it cannot be reached.
    pub async fn ping_store(&self) -> Result<(), AccountError> {
        Ok(self.store.ping().await?)
    }

    async fn hash_password(&self, password: SecretString) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
            .await
            .context("hashing task failed")
            .map_err(AccountError::Hashing)?
            .map_err(AccountError::Hashing)
    }

    async fn verify_password(
        &self,
        password: SecretString,
        stored_hash: String,
    ) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(password.expose_secret(), &stored_hash))
            .await
            .context("verification task failed")
            .map_err(AccountError::Hashing)
    }
}

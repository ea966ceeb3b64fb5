//! Postgres-backed account store.

use super::{AccountStore, StoreError};
use crate::accounts::model::{Account, AccountId, AccountPatch, NewAccount};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::{future::Future, pin::Pin};
use tracing::{Instrument, Span, debug, instrument, warn};

/// Idempotent DDL for the `accounts` table.
pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Future returned by a [`with_transaction`] body.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 't>>;

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Run `operation` in a transaction that commits only if it returns `Ok`.
///
/// Every `Err` rolls back. If the returned future is dropped before it
/// finishes (for example by a request timeout) the transaction is dropped
/// with it and sqlx rolls it back when the connection returns to the pool.
///
/// # Errors
/// Returns the body's error, or [`StoreError::Backend`] if the transaction
/// cannot be started or committed.
pub async fn with_transaction<T, F>(pool: &PgPool, operation: F) -> Result<T, StoreError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> TxFuture<'t, T> + Send,
{
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StoreError::backend(e, "begin transaction"))?;

    match operation(&mut tx).await {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| StoreError::backend(e, "commit transaction"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("transaction rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let read = || -> Result<Account, sqlx::Error> {
        Ok(Account {
            id: AccountId::new(row.try_get("id")?),
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            email: row.try_get("email")?,
        })
    };
    read().map_err(|e| StoreError::backend(e, "decode account row"))
}

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `accounts` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the DDL cannot be executed.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(db_span("CREATE", "CREATE TABLE IF NOT EXISTS accounts"))
            .await
            .context("failed to apply accounts schema")?;
        Ok(())
    }
}

const SELECT_BY_ID: &str = "SELECT id, username, password_hash, email FROM accounts WHERE id = $1";
const SELECT_BY_ID_FOR_UPDATE: &str =
    "SELECT id, username, password_hash, email FROM accounts WHERE id = $1 FOR UPDATE";
const SELECT_BY_USERNAME: &str =
    "SELECT id, username, password_hash, email FROM accounts WHERE username = $1";
const USERNAME_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1)";
const USERNAME_HELD_BY_OTHER: &str =
    "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1 AND id <> $2)";
const INSERT_ACCOUNT: &str = r"
    INSERT INTO accounts (username, password_hash, email)
    VALUES ($1, $2, $3)
    RETURNING id
";
const UPDATE_ACCOUNT: &str = "UPDATE accounts SET username = $2, password_hash = $3 WHERE id = $1";
const DELETE_ACCOUNT: &str = "DELETE FROM accounts WHERE id = $1";

#[async_trait]
impl AccountStore for PgAccountStore {
    #[instrument(skip(self))]
    async fn create_if_username_free(&self, account: NewAccount) -> Result<AccountId, StoreError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let taken: bool = sqlx::query_scalar(USERNAME_EXISTS)
                    .bind(&account.username)
                    .fetch_one(&mut **tx)
                    .instrument(db_span("SELECT", USERNAME_EXISTS))
                    .await
                    .map_err(|e| StoreError::backend(e, "check username"))?;
                if taken {
                    debug!("username already held");
                    return Err(StoreError::UsernameTaken);
                }

                // A concurrent insert of the same username can still slip past the
                // check above; the UNIQUE constraint turns it into a conflict here.
                let id: i64 = sqlx::query_scalar(INSERT_ACCOUNT)
                    .bind(&account.username)
                    .bind(&account.password_hash)
                    .bind(&account.email)
                    .fetch_one(&mut **tx)
                    .instrument(db_span("INSERT", INSERT_ACCOUNT))
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            StoreError::UsernameTaken
                        } else {
                            StoreError::backend(e, "insert account")
                        }
                    })?;

                Ok(AccountId::new(id))
            })
        })
        .await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(SELECT_BY_ID)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", SELECT_BY_ID))
            .await
            .map_err(|e| StoreError::backend(e, "find account by id"))?;

        row.as_ref()
            .map_or(Err(StoreError::NotFound), account_from_row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError> {
        let row = sqlx::query(SELECT_BY_USERNAME)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", SELECT_BY_USERNAME))
            .await
            .map_err(|e| StoreError::backend(e, "find account by username"))?;

        row.as_ref()
            .map_or(Err(StoreError::NotFound), account_from_row)
    }

    #[instrument(skip(self))]
    async fn update_with_conflict_check(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<(), StoreError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                // Lock the row so a concurrent delete or update waits for us (or we
                // for it) instead of acting on a stale copy.
                let row = sqlx::query(SELECT_BY_ID_FOR_UPDATE)
                    .bind(id.get())
                    .fetch_optional(&mut **tx)
                    .instrument(db_span("SELECT", SELECT_BY_ID_FOR_UPDATE))
                    .await
                    .map_err(|e| StoreError::backend(e, "re-read account"))?;
                let current = row
                    .as_ref()
                    .map_or(Err(StoreError::NotFound), account_from_row)?;

                if patch.is_empty() {
                    return Ok(());
                }

                if patch.renames(&current.username) {
                    let held: bool = sqlx::query_scalar(USERNAME_HELD_BY_OTHER)
                        .bind(patch.username.as_deref())
                        .bind(id.get())
                        .fetch_one(&mut **tx)
                        .instrument(db_span("SELECT", USERNAME_HELD_BY_OTHER))
                        .await
                        .map_err(|e| StoreError::backend(e, "check username"))?;
                    if held {
                        return Err(StoreError::UsernameTaken);
                    }
                }

                let updated = patch.apply(&current);
                sqlx::query(UPDATE_ACCOUNT)
                    .bind(id.get())
                    .bind(&updated.username)
                    .bind(&updated.password_hash)
                    .execute(&mut **tx)
                    .instrument(db_span("UPDATE", UPDATE_ACCOUNT))
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            StoreError::UsernameTaken
                        } else {
                            StoreError::backend(e, "update account")
                        }
                    })?;

                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let result = sqlx::query(DELETE_ACCOUNT)
                    .bind(id.get())
                    .execute(&mut **tx)
                    .instrument(db_span("DELETE", DELETE_ACCOUNT))
                    .await
                    .map_err(|e| StoreError::backend(e, "delete account"))?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound);
                }
                Ok(())
            })
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(db_span("SELECT", "SELECT 1"))
            .await
            .map_err(|e| StoreError::backend(e, "ping database"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn schema_declares_unique_username() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS accounts"));
        assert!(SCHEMA_SQL.contains("username      TEXT NOT NULL UNIQUE"));
        assert!(SCHEMA_SQL.contains("GENERATED ALWAYS AS IDENTITY"));
    }

    #[test]
    fn backend_errors_keep_context() {
        let err = StoreError::backend(sqlx::Error::PoolTimedOut, "begin transaction");
        let StoreError::Backend(source) = err else {
            panic!("expected backend error");
        };
        assert_eq!(source.to_string(), "begin transaction");
        assert!(format!("{source:#}").contains("pool timed out"));
    }
}

mod common;

use accountd::accounts::{
    AccountError, Credentials, RegisterInput,
    model::{AccountPatch, NewAccount},
    store::{AccountStore, StoreError},
};
use anyhow::Result;
use common::TestDb;
use secrecy::SecretString;
use std::sync::Arc;

fn new_account(username: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        password_hash: format!("$argon2id$stub${username}"),
        email: format!("{username}@x.com"),
    }
}

macro_rules! test_db {
    () => {
        match TestDb::new().await {
            Ok(db) => db,
            Err(err) => {
                eprintln!("Skipping Postgres test: {err:#}");
                return Ok(());
            }
        }
    };
}

#[tokio::test]
async fn create_find_and_delete_round_trip() -> Result<()> {
    let db = test_db!();
    let store = db.store();

    let id = store.create_if_username_free(new_account("alice")).await?;
    let by_id = store.find_by_id(id).await?;
    let by_name = store.find_by_username("alice").await?;
    assert_eq!(by_id, by_name);
    assert_eq!(by_id.email, "alice@x.com");

    assert!(matches!(
        store.find_by_username("ALICE").await,
        Err(StoreError::NotFound)
    ));

    store.delete(id).await?;
    assert!(matches!(store.find_by_id(id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.delete(id).await, Err(StoreError::NotFound)));

    // Identity values are never handed out twice.
    let again = store.create_if_username_free(new_account("alice")).await?;
    assert_ne!(again, id);

    store.ping().await?;
    // Applying the schema a second time is a no-op.
    store.ensure_schema().await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_yield_one_winner() -> Result<()> {
    let db = test_db!();
    let store = Arc::new(db.store());

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.create_if_username_free(new_account("carol")).await
        }));
    }

    let mut created = 0;
    let mut taken = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => created += 1,
            Err(StoreError::UsernameTaken) => taken += 1,
            Err(err) => return Err(err.into()),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(taken, 11);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE username = 'carol'")
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test]
async fn rename_conflict_rolls_back_every_change() -> Result<()> {
    let db = test_db!();
    let store = db.store();

    let alice = store.create_if_username_free(new_account("alice")).await?;
    store.create_if_username_free(new_account("bob")).await?;
    let before = store.find_by_id(alice).await?;

    let patch = AccountPatch {
        username: Some("bob".to_string()),
        password_hash: Some("$argon2id$rotated".to_string()),
    };
    assert!(matches!(
        store.update_with_conflict_check(alice, patch).await,
        Err(StoreError::UsernameTaken)
    ));
    assert_eq!(store.find_by_id(alice).await?, before);

    let patch = AccountPatch {
        username: Some("alicia".to_string()),
        password_hash: Some("$argon2id$rotated".to_string()),
    };
    store.update_with_conflict_check(alice, patch).await?;
    let after = store.find_by_id(alice).await?;
    assert_eq!(after.username, "alicia");
    assert_eq!(after.password_hash, "$argon2id$rotated");
    assert_eq!(after.email, before.email);

    // An empty patch only checks that the row exists; no new row version is written.
    let row_version = "SELECT xmin::text FROM accounts WHERE id = $1";
    let version_before: String = sqlx::query_scalar(row_version)
        .bind(alice.get())
        .fetch_one(&db.pool)
        .await?;
    store
        .update_with_conflict_check(alice, AccountPatch::default())
        .await?;
    let version_after: String = sqlx::query_scalar(row_version)
        .bind(alice.get())
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(version_before, version_after);
    assert_eq!(store.find_by_id(alice).await?, after);
    store.delete(alice).await?;
    assert!(matches!(
        store
            .update_with_conflict_check(alice, AccountPatch::default())
            .await,
        Err(StoreError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn service_register_and_login_over_postgres() -> Result<()> {
    let db = test_db!();
    let service = common::service_with(Arc::new(db.store()))?;

    let input = |password: &str| RegisterInput {
        username: "dave".to_string(),
        password: SecretString::from(password.to_string()),
        repeat_password: SecretString::from(password.to_string()),
        email: "dave@x.com".to_string(),
    };

    let id = service.register(input("p1")).await?;
    assert!(matches!(
        service.register(input("p2")).await,
        Err(AccountError::UsernameTaken)
    ));

    let (account, issued) = service
        .authenticate_and_issue_token(Credentials {
            username: "dave".to_string(),
            password: SecretString::from("p1".to_string()),
        })
        .await?;
    assert_eq!(account.id, id);
    assert_eq!(service.tokens().verify(&issued.token)?, id);

    let stored: String = sqlx::query_scalar("SELECT password_hash FROM accounts WHERE id = $1")
        .bind(id.get())
        .fetch_one(&db.pool)
        .await?;
    assert!(stored.starts_with("$argon2id$"));
    Ok(())
}

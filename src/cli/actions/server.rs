use crate::{
    accounts::{
        AccountService, CredentialHasher, HasherParams,
        store::{AccountStore, PgAccountStore},
    },
    gateway,
    token::{TokenConfig, TokenIssuer},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{fmt::Write, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub token_secret: SecretString,
    pub token_ttl: Duration,
    pub hasher: HasherParams,
    pub request_timeout: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database cannot be
/// reached or prepared, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let hasher = CredentialHasher::new(args.hasher)?;
    let tokens = TokenIssuer::new(
        &TokenConfig::new(args.token_secret, args.token_ttl)
            .context("Invalid token configuration")?,
    );

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(args.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(args.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = PgAccountStore::new(pool);
    store.ensure_schema().await?;

    let store: Arc<dyn AccountStore> = Arc::new(store);
    let service = Arc::new(AccountService::new(store, hasher, tokens)?);

    gateway::new(args.port, service, args.request_timeout).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(args.dsn.expose_secret())),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("token_ttl_seconds", args.token_ttl.as_secs().to_string()),
        ("argon2_memory_kib", args.hasher.memory_kib.to_string()),
        ("argon2_iterations", args.hasher.iterations.to_string()),
        ("argon2_parallelism", args.hasher.parallelism.to_string()),
        (
            "request_timeout_seconds",
            args.request_timeout.as_secs().to_string(),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} ({})\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

use crate::{
    accounts::HasherParams,
    cli::{
        actions::{Action, server::Args},
        commands::{self, database, hashing, token},
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let dsn = matches
        .get_one::<String>(database::ARG_DSN)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --dsn")?;

    let token_secret = matches
        .get_one::<String>(token::ARG_TOKEN_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;

    let token_ttl_hours = matches
        .get_one::<u64>(token::ARG_TOKEN_TTL_HOURS)
        .copied()
        .unwrap_or(72);

    let defaults = HasherParams::default();
    let hasher = HasherParams {
        memory_kib: matches
            .get_one::<u32>(hashing::ARG_ARGON2_MEMORY_KIB)
            .copied()
            .unwrap_or(defaults.memory_kib),
        iterations: matches
            .get_one::<u32>(hashing::ARG_ARGON2_ITERATIONS)
            .copied()
            .unwrap_or(defaults.iterations),
        parallelism: matches
            .get_one::<u32>(hashing::ARG_ARGON2_PARALLELISM)
            .copied()
            .unwrap_or(defaults.parallelism),
    };

    let db_max_connections = matches
        .get_one::<u32>(database::ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);

    let request_timeout = matches
        .get_one::<u64>(commands::ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(30);

    Ok(Action::Server(Args {
        port,
        dsn,
        db_max_connections,
        token_secret,
        token_ttl: Duration::from_secs(token_ttl_hours.saturating_mul(60 * 60)),
        hasher,
        request_timeout: Duration::from_secs(request_timeout),
    }))
}

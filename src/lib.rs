//! # accountd (Account & Credential Service)
//!
//! `accountd` owns user accounts: it registers them, enforces username
//! uniqueness, hashes and verifies passwords and, on a successful login, issues
//! a signed, time-limited access token.
//!
//! ## Layers
//!
//! - [`accounts::hasher`]: Argon2id password hashing. Plaintext never leaves
//!   the request that carried it.
//! - [`accounts::store`]: transactional persistence behind the
//!   [`accounts::store::AccountStore`] trait (Postgres in production, an
//!   in-memory map for tests).
//! - [`accounts::service`]: use cases (register, authenticate, update,
//!   delete) with input validation and error mapping.
//! - [`token`]: HS256 access tokens bound to an account id.
//! - [`gateway`]: the HTTP adapter (axum) that turns JSON requests into
//!   service calls and domain errors into status codes.
//!
//! ## Usernames
//!
//! Usernames are compared byte for byte. `Alice` and `alice` are two
//! different accounts.

pub mod accounts;
pub mod cli;
pub mod gateway;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

//! Password hashing.
//!
//! Passwords are hashed with Argon2id into PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`). Every call draws a fresh
//! salt, so hashing the same password twice yields two different strings.
//! Verification reads the parameters back from the stored string, which lets
//! cost settings change without invalidating existing hashes.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::{RngCore, rngs::OsRng};

const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: HasherParams,
}

impl CredentialHasher {
    /// Build a hasher, rejecting parameters Argon2 would refuse at hash time.
    ///
    /// # Errors
    /// Returns an error if the cost parameters are out of range.
    pub fn new(params: HasherParams) -> Result<Self> {
        let hasher = Self { params };
        hasher.argon2()?;
        Ok(hasher)
    }

    #[must_use]
    pub const fn params(&self) -> HasherParams {
        self.params
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            None,
        )
        .map_err(|e| anyhow!("invalid Argon2 parameters: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plaintext password into a PHC string.
    ///
    /// # Errors
    /// Returns an error only if the OS entropy source or Argon2 itself fails.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .context("failed to gather salt entropy")?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| anyhow!("invalid salt: {e}"))?;

        let hash = self
            .argon2()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Check `plaintext` against a stored PHC string.
    ///
    /// A malformed stored hash and a wrong password both return `false`.
    #[must_use]
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    // Minimum costs keep the test suite fast; production uses the defaults.
    CredentialHasher {
        params: HasherParams {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
    }
}

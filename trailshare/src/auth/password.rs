use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::ApiError;

/// Verified against when the account is unknown, so login takes as long
/// whether or not the email is registered
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_blocking("trailshare-dummy-password").unwrap_or_default());

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_blocking(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}

/// Argon2id PHC string for `password`, computed off the async workers
///
/// # Errors
/// Internal error if hashing fails.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| ApiError::internal("Could not hash password", Some(e.to_string())))?
        .map_err(|e| ApiError::internal("Could not hash password", Some(e.to_string())))
}

/// `false` for a wrong password and for a corrupt stored hash alike.
/// `None` checks against a throwaway hash and is always `false`.
///
/// # Errors
/// Internal error if the blocking task fails.
pub async fn verify_password(password: String, stored_hash: Option<String>) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_blocking(&password, &hash),
        None => {
            verify_blocking(&password, &DUMMY_HASH);
            false
        }
    })
    .await
    .map_err(|e| ApiError::internal("Could not verify password", Some(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery".to_string(), Some(hash.clone())).await.unwrap());
        assert!(!verify_password("wrong".to_string(), Some(hash)).await.unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_blocking("same").unwrap(), hash_blocking("same").unwrap());
    }

    #[test]
    fn test_corrupt_hash() {
        assert!(!verify_blocking("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_unknown_account_runs_a_real_verification() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!verify_password("trailshare-dummy-password".to_string(), None).await.unwrap());
    }
}

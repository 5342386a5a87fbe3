//! Bcrypt password hashing for link passwords.

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;

/// Hashes and verifies link passwords with bcrypt.
///
/// Bcrypt is CPU-bound, so both operations run on the blocking pool to
/// keep the async executor responsive.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost factor.
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password.
    pub async fn hash(&self, password: &str) -> AppResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
    }

    /// Verify a plaintext password against a stored bcrypt hash.
    ///
    /// Returns `InvalidCredentials` on mismatch, so callers can pass the
    /// error straight through the `?` operator.
    pub async fn verify(&self, password: &str, hash: &str) -> AppResult<()> {
        let password = password.to_string();
        let hash = hash.to_string();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Failed to verify password: {e}")))?;

        if valid {
            Ok(())
        } else {
            Err(AppError::invalid_credentials("Invalid password"))
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

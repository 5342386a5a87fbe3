//! Derived signatures for public link shares.
//!
//! A signature is a time-boxed capability computed from material the
//! server already stores: the HMAC key is the SHA-256 digest of the
//! bcrypt hash (never the plaintext password), and the message binds
//! the token to the expiration instant, so neither field can be swapped
//! without invalidating the MAC.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_entity::public::{PublicShare, Signature};

type HmacSha256 = Hmac<Sha256>;

/// Validity window of an issued signature.
pub fn signature_ttl() -> Duration {
    Duration::minutes(30)
}

fn compute(token: &str, password_hash: &str, expiration: DateTime<Utc>) -> AppResult<Vec<u8>> {
    let key = Sha256::digest(password_hash.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AppError::internal(format!("Failed to initialize HMAC: {e}")))?;
    mac.update(format!("{}|{}", token, expiration.to_rfc3339()).as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compute the hex-encoded signature for a token, stored password hash,
/// and expiration instant.
pub fn create_signature(
    token: &str,
    password_hash: &str,
    expiration: DateTime<Utc>,
) -> AppResult<String> {
    Ok(hex::encode(compute(token, password_hash, expiration)?))
}

/// Attach a fresh signature (valid for [`signature_ttl`]) to the share.
pub fn add_signature(share: &mut PublicShare, password_hash: &str) -> AppResult<()> {
    let expiration = Utc::now() + signature_ttl();
    let signature = create_signature(&share.token, password_hash, expiration)?;
    debug!(token = %share.token, %expiration, "Issued public share signature");
    share.signature = Some(Signature {
        signature,
        expiration,
    });
    Ok(())
}

/// Verify a presented signature against the share's token and stored
/// password hash.
///
/// Expired signatures are rejected before any cryptographic work; the
/// MAC comparison itself is constant-time.
pub fn verify_signature(
    token: &str,
    password_hash: &str,
    presented: &Signature,
) -> AppResult<()> {
    if presented.expiration <= Utc::now() {
        return Err(AppError::invalid_credentials("Signature has expired"));
    }

    let raw = hex::decode(&presented.signature)
        .map_err(|_| AppError::invalid_credentials("Malformed signature"))?;

    let key = Sha256::digest(password_hash.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AppError::internal(format!("Failed to initialize HMAC: {e}")))?;
    mac.update(format!("{}|{}", token, presented.expiration.to_rfc3339()).as_bytes());
    mac.verify_slice(&raw)
        .map_err(|_| AppError::invalid_credentials("Invalid signature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_core::error::ErrorKind;

    const HASH: &str = "$2b$04$GvL57EjRUoZpBmaFZaxqluqY53u0wYdiIDEZNm7jNXHMSTDFDq8K6";

    #[test]
    fn test_round_trip() {
        let exp = Utc::now() + Duration::minutes(10);
        let sig = Signature {
            signature: create_signature("tok123", HASH, exp).unwrap(),
            expiration: exp,
        };
        verify_signature("tok123", HASH, &sig).unwrap();
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let exp = Utc::now() + Duration::minutes(10);
        let a = create_signature("tok123", HASH, exp).unwrap();
        let b = create_signature("tok123", HASH, exp).unwrap();
        assert_eq!(a, b);
        // 32-byte MAC, hex encoded.
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_binds_token_and_expiration() {
        let exp = Utc::now() + Duration::minutes(10);
        let sig = Signature {
            signature: create_signature("tok123", HASH, exp).unwrap(),
            expiration: exp,
        };

        // Different token.
        let err = verify_signature("tok999", HASH, &sig).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);

        // Tampered expiration.
        let tampered = Signature {
            expiration: exp + Duration::minutes(1),
            ..sig
        };
        let err = verify_signature("tok123", HASH, &tampered).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_different_hash_invalidates() {
        let exp = Utc::now() + Duration::minutes(10);
        let sig = Signature {
            signature: create_signature("tok123", HASH, exp).unwrap(),
            expiration: exp,
        };
        let err = verify_signature("tok123", "$2b$04$other", &sig).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_expired_signature_rejected() {
        let exp = Utc::now() - Duration::seconds(1);
        let sig = Signature {
            signature: create_signature("tok123", HASH, exp).unwrap(),
            expiration: exp,
        };
        let err = verify_signature("tok123", HASH, &sig).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_add_signature_sets_window() {
        let mut share = sample_share();
        add_signature(&mut share, HASH).unwrap();

        let sig = share.signature.as_ref().unwrap();
        let remaining = sig.expiration - Utc::now();
        assert!(remaining > Duration::minutes(29));
        assert!(remaining <= Duration::minutes(30));
        verify_signature(&share.token, HASH, sig).unwrap();
    }

    fn sample_share() -> PublicShare {
        use sharehub_core::types::{Permissions, ResourceId, UserId};
        use sharehub_entity::share::ShareId;

        PublicShare {
            id: ShareId::from_string("1"),
            token: "Ahn9phie2aeToh1".to_string(),
            resource_id: ResourceId::new("s1", "r1"),
            owner: UserId::new("idp", "alice"),
            creator: UserId::new("idp", "alice"),
            permissions: Permissions::viewer(),
            ctime: Utc::now(),
            mtime: Utc::now(),
            display_name: String::new(),
            password_protected: true,
            expiration: None,
            signature: None,
        }
    }
}

//! Authentication: password hashing, JWT issuance/verification for the
//! access/refresh token pair, and API-key matching. Grounded on the
//! grounding repo's `utils::auth::{JwtAuth, Claims}` shape referenced
//! throughout `safekeeper`/`pageserver` (a `jsonwebtoken`-backed claims
//! struct with a typed `exp`), generalized here from a single
//! pageserver-scope claim to the spec's access/refresh token pair, and
//! from mTLS-adjacent HS256 service auth to end-user password auth, which
//! the grounding repo has no analog for (`argon2` is introduced for that
//! reason alone; nothing in the pack hashes end-user passwords).

pub mod extractor;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use utils::id::TenantId;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

#[derive(Debug, Clone)]
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: String, access_ttl: std::time::Duration, refresh_ttl: std::time::Duration) -> Self {
        TokenService {
            secret,
            access_ttl: Duration::from_std(access_ttl).unwrap_or(Duration::minutes(30)),
            refresh_ttl: Duration::from_std(refresh_ttl).unwrap_or(Duration::days(7)),
        }
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }

    /// Issues a 30-minute-default HS256 access token carrying `{sub, email,
    /// exp, type:"access"}`.
    pub fn issue_access_token(&self, tenant_id: TenantId, email: &str) -> Result<String, ApiError> {
        let claims = AccessClaims {
            sub: tenant_id.to_string(),
            email: email.to_string(),
            exp: expiry(self.access_ttl),
            token_type: "access".to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key())
            .map_err(|e| ApiError::internal(format!("sign access token: {e}")))
    }

    /// Issues a 7-day-default HS256 refresh token carrying `{sub, exp,
    /// type:"refresh"}`.
    pub fn issue_refresh_token(&self, tenant_id: TenantId) -> Result<String, ApiError> {
        let claims = RefreshClaims {
            sub: tenant_id.to_string(),
            exp: expiry(self.refresh_ttl),
            token_type: "refresh".to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key())
            .map_err(|e| ApiError::internal(format!("sign refresh token: {e}")))
    }

    /// Verifies an access token's signature and expiry, and rejects a
    /// refresh token presented where an access token is required (the
    /// `type` claim distinguishes the two, since both share the same
    /// signing key).
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key(), &Validation::default())
            .map_err(|_| ApiError::unauthenticated("invalid or expired access token"))?;
        if data.claims.token_type != "access" {
            return Err(ApiError::unauthenticated("token is not an access token"));
        }
        Ok(data.claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        let data = decode::<RefreshClaims>(token, &self.decoding_key(), &Validation::default())
            .map_err(|_| ApiError::unauthenticated("invalid or expired refresh token"))?;
        if data.claims.token_type != "refresh" {
            return Err(ApiError::unauthenticated("token is not a refresh token"));
        }
        Ok(data.claims)
    }
}

fn expiry(ttl: Duration) -> i64 {
    (Utc::now() + ttl).timestamp()
}

/// Hashes a plaintext password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal(format!("hash password: {e}")))
}

/// Verifies a plaintext password against a stored argon2 hash. A
/// malformed stored hash is treated as a verification failure rather than
/// a 500, since it can only arise from stored-data corruption, not from
/// anything the caller did.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// SHA-256 of a raw API key, the only form ever persisted.
pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a fresh raw API key, prefixed so that leaked-credential
/// scanners can recognize it, with only its hash ever touching the store.
pub fn generate_api_key() -> String {
    format!("dfk_{}", utils::token::random_hex_token(40))
}

pub fn parse_tenant_id(claims_sub: &str) -> Result<TenantId, ApiError> {
    claims_sub
        .parse()
        .map_err(|_| ApiError::unauthenticated("malformed subject claim"))
}

/// True once `now` is past `exp` (seconds since epoch). Exposed for the
/// api-key `last_used_at` bookkeeping path, which has no JWT of its own.
pub fn is_expired(exp: i64, now: DateTime<Utc>) -> bool {
    now.timestamp() > exp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn access_and_refresh_tokens_round_trip_and_are_distinct() {
        let svc = TokenService::new(
            "a-secret-at-least-32-bytes-long!".to_string(),
            std::time::Duration::from_secs(1800),
            std::time::Duration::from_secs(604800),
        );
        let tenant = TenantId::new(42);
        let access = svc.issue_access_token(tenant, "alice@x.com").unwrap();
        let refresh = svc.issue_refresh_token(tenant).unwrap();

        let access_claims = svc.verify_access_token(&access).unwrap();
        assert_eq!(access_claims.sub, "42");
        assert_eq!(access_claims.email, "alice@x.com");

        assert!(svc.verify_access_token(&refresh).is_err());
        assert!(svc.verify_refresh_token(&access).is_err());
    }

    #[test]
    fn api_key_hash_is_deterministic() {
        let key = generate_api_key();
        assert!(key.starts_with("dfk_"));
        assert_eq!(hash_api_key(&key), hash_api_key(&key));
    }
}

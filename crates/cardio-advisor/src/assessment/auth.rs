//! Credential hashing and signed access tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Access tokens are compact HS256 JWTs carrying
//! the user id (`sub`) and an expiry (`exp`, unix seconds).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use std::sync::OnceLock;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::domain::UserId;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 256;

const TOKEN_ALGORITHM: &str = "HS256";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token is malformed")]
    MalformedToken,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

/// Returns `false` for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Argon2id hash of a throwaway password, verified against when a login names no account.
pub fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("unregistered-account-decoy").unwrap_or_default())
}

/// Trims and lowercases an address, rejecting anything not shaped like `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty());
    valid.then_some(email)
}

pub fn password_length_ok(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.chars().count())
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    exp: i64,
}

/// Bearer token handed back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<AccessToken, AuthError> {
        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let claims = TokenClaims {
            sub: user_id.to_string(),
            exp: (now + self.ttl).timestamp(),
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(AccessToken {
            access_token: format!("{signing_input}.{signature}"),
            token_type: "bearer".to_string(),
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let header: TokenHeader = decode_segment(header)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(AuthError::MalformedToken);
        }

        let claims: TokenClaims = decode_segment(claims)?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }

        Uuid::parse_str(&claims.sub)
            .map(UserId)
            .map_err(|_| AuthError::MalformedToken)
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidSignature)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AuthError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|_| AuthError::MalformedToken)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

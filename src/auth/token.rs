// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 token issuing and validation.
//!
//! Tokens use the compact JWS layout: `base64url(header).base64url(claims).base64url(mac)`
//! with unpadded base64url segments and an HMAC-SHA256 tag over the first two
//! segments. The header is fixed to `{"alg":"HS256","typ":"JWT"}`.
//!
//! Validation checks the signature before any segment is decoded, so no
//! field of an unverified payload is ever interpreted.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;

use super::claims::{Claims, TokenType};

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const ALGORITHM: &str = "HS256";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("expected {expected} token, found {found}")]
    WrongType {
        expected: TokenType,
        found: TokenType,
    },

    #[error("token lifetime must be a positive whole number of seconds")]
    InvalidLifetime,

    #[error("signing key must be at least {min} bytes")]
    WeakKey { min: usize },

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

// =============================================================================
// Signing key
// =============================================================================

/// Process-wide HMAC secret. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    pub const MIN_LEN: usize = 32;

    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.len() < Self::MIN_LEN {
            return Err(TokenError::WeakKey { min: Self::MIN_LEN });
        }
        Ok(Self(Arc::from(secret)))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.0).map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

// =============================================================================
// Lifetimes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(1),
            refresh: Duration::days(7),
        }
    }
}

/// Access and refresh tokens minted together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

// =============================================================================
// Issuer
// =============================================================================

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: SigningKey,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(key: SigningKey, lifetimes: TokenLifetimes) -> Self {
        Self { key, lifetimes }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    pub fn issue(
        &self,
        subject: &str,
        roles: &[String],
        ttl: Duration,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, roles, ttl, token_type, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    ///
    /// `iat` and `exp` are whole seconds, so `ttl` must be a positive whole
    /// number of seconds; anything else is `InvalidLifetime`.
    pub fn issue_at(
        &self,
        subject: &str,
        roles: &[String],
        ttl: Duration,
        token_type: TokenType,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl_secs = ttl.num_seconds();
        if ttl_secs <= 0 || ttl.subsec_nanos() != 0 {
            return Err(TokenError::InvalidLifetime);
        }

        let roles: BTreeSet<&String> = roles.iter().collect();
        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.into_iter().cloned().collect(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
            typ: token_type,
        };
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(HEADER_JSON.as_bytes()),
            Base64UrlUnpadded::encode_string(&claims_json)
        );
        let mut mac = self.key.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    pub fn issue_pair(&self, subject: &str, roles: &[String]) -> Result<TokenPair, TokenError> {
        let now = Utc::now().timestamp();
        Ok(TokenPair {
            access_token: self.issue_at(
                subject,
                roles,
                self.lifetimes.access,
                TokenType::Access,
                now,
            )?,
            refresh_token: self.issue_at(
                subject,
                roles,
                self.lifetimes.refresh,
                TokenType::Refresh,
                now,
            )?,
            expires_in: self.lifetimes.access.num_seconds(),
        })
    }
}

// =============================================================================
// Validator
// =============================================================================

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

/// Verifies tokens minted by a [`TokenIssuer`] holding the same key.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    key: SigningKey,
}

impl TokenValidator {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate and require a specific token type.
    pub fn validate_as(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.typ != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.typ,
            });
        }
        Ok(claims)
    }

    /// Validate as if the current time were `now` (Unix seconds).
    ///
    /// Any change to the decoded signature bytes yields `SignatureInvalid`.
    /// Edits to the token text that break its structure (an extra `.`, an
    /// emptied segment) are reported as `Malformed` instead; both reject.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature).map_err(|_| TokenError::SignatureInvalid)?;
        let mut mac = self.key.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::SignatureInvalid)?;

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }
        let claims: Claims = decode_segment(payload)?;
        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

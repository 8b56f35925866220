//! Bearer credential verification.
//!
//! Tokens are HS256 JWTs carrying `user_id`, `role` and `exp`, issued by the
//! user service with a secret shared with the gateway.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::AuthConfig;

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id.
    pub user_id: u64,
    pub role: String,
    /// Expiry, unix seconds.
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

impl Claims {
    pub fn subject(&self) -> u64 {
        self.user_id
    }

    pub fn has_role(&self, allowed: &[String]) -> bool {
        allowed.iter().any(|r| *r == self.role)
    }
}

/// Why a credential was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("invalid authorization header format")]
    BadScheme,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for ClaimsError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => ClaimsError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => ClaimsError::InvalidSignature,
            _ => ClaimsError::Malformed(err.to_string()),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ClaimsError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(ClaimsError::MissingHeader)?
        .to_str()
        .map_err(|_| ClaimsError::BadScheme)?;
    if value.is_empty() {
        return Err(ClaimsError::MissingHeader);
    }

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(ClaimsError::BadScheme),
    }
}

/// Verifies (and, for tooling, issues) bearer tokens.
#[derive(Clone)]
pub struct ClaimsVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl std::fmt::Debug for ClaimsVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsVerifier")
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl ClaimsVerifier {
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.leeway_secs)
    }

    /// Check signature and expiry, returning fully-populated claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ClaimsError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        if claims.user_id == 0 {
            return Err(ClaimsError::Malformed("missing subject".into()));
        }
        if claims.role.trim().is_empty() {
            return Err(ClaimsError::Malformed("missing role".into()));
        }
        Ok(claims)
    }

    /// Verify the request's bearer credential.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims, ClaimsError> {
        self.verify(bearer_token(headers)?)
    }

    /// Like [`verify_headers`](Self::verify_headers) but never fails.
    pub fn verify_optional(&self, headers: &HeaderMap) -> Option<Claims> {
        match self.verify_headers(headers) {
            Ok(claims) => Some(claims),
            Err(ClaimsError::MissingHeader) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid optional credential");
                None
            }
        }
    }

    /// Mint a token for `subject` valid for `ttl`.
    pub fn issue(&self, subject: u64, role: &str, ttl: Duration) -> Result<String, ClaimsError> {
        let now = unix_now();
        let claims = Claims {
            user_id: subject,
            role: role.to_string(),
            exp: now.saturating_add(ttl.as_secs()),
            iat: Some(now),
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, ClaimsError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ClaimsError::Signing(e.to_string()))
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn verifier() -> ClaimsVerifier {
        ClaimsVerifier::new("test-secret", 0)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_round_trip() {
        let v = verifier();
        let token = v.issue(7, "customer", Duration::from_secs(60)).unwrap();
        let claims = v.verify(&token).unwrap();
        assert_eq!(claims.subject(), 7);
        assert_eq!(claims.role, "customer");
        assert!(claims.exp > unix_now());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let v = verifier();
        let token = v.issue(7, "customer", Duration::MAX).unwrap();
        assert_eq!(v.verify(&token).unwrap().exp, u64::MAX);
    }

    #[test]
    fn test_expired_token() {
        let v = verifier();
        let token = v
            .sign(&Claims {
                user_id: 7,
                role: "customer".into(),
                exp: unix_now() - 10,
                iat: None,
            })
            .unwrap();
        assert_eq!(v.verify(&token), Err(ClaimsError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let token = ClaimsVerifier::new("other", 0)
            .issue(7, "customer", Duration::from_secs(60))
            .unwrap();
        assert_eq!(verifier().verify(&token), Err(ClaimsError::InvalidSignature));
    }

    #[test]
    fn test_malformed_and_partial_tokens() {
        let v = verifier();
        assert!(matches!(v.verify("not-a-jwt"), Err(ClaimsError::Malformed(_))));

        let no_role = v
            .sign(&Claims {
                user_id: 7,
                role: String::new(),
                exp: unix_now() + 60,
                iat: None,
            })
            .unwrap();
        assert!(matches!(v.verify(&no_role), Err(ClaimsError::Malformed(_))));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(ClaimsError::MissingHeader));
        assert_eq!(bearer_token(&headers("Token abc")), Err(ClaimsError::BadScheme));
        assert_eq!(bearer_token(&headers("Bearer")), Err(ClaimsError::BadScheme));
        assert_eq!(bearer_token(&headers("Bearer a b")), Err(ClaimsError::BadScheme));
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
    }

    #[test]
    fn test_optional_verification_never_fails() {
        let v = verifier();
        assert!(v.verify_optional(&HeaderMap::new()).is_none());
        assert!(v.verify_optional(&headers("Bearer garbage")).is_none());

        let token = v.issue(3, "admin", Duration::from_secs(60)).unwrap();
        let claims = v.verify_optional(&headers(&format!("Bearer {}", token))).unwrap();
        assert_eq!(claims.role, "admin");
    }
}

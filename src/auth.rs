use crate::config;
use crate::types::identity::{AdminIdentity, Role};

pub mod credentials;
pub(crate) mod revocation;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, HS256Key, VerificationOptions};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use std::collections::HashSet;

pub use credentials::{AuthFailure, CredentialStore};
use revocation::RevocationList;

pub const SESSION_COOKIE_NAME: &str = "admin_session";
pub const SESSION_COOKIE_PATH: &str = "/admin";
pub(crate) const CLOCK_SKEW_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid session key")]
    InvalidKey,
    #[error("invalid session ttl")]
    InvalidTtl,
    #[error("failed to sign session token")]
    Signing,
}

/// Identity snapshot carried inside the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    id: String,
    email: String,
    name: String,
    role: Role,
}

impl From<&AdminIdentity> for SessionClaims {
    fn from(identity: &AdminIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
        }
    }
}

impl From<SessionClaims> for AdminIdentity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// A token that verified: who it belongs to and how to revoke it.
#[derive(Debug, Clone)]
pub(crate) struct VerifiedSession {
    pub(crate) identity: AdminIdentity,
    token_id: String,
    expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Missing,
    Malformed,
    Revoked,
}

/// Issues, resolves and revokes `admin_session` cookies.
pub struct SessionGuard {
    key: HS256Key,
    issuer: String,
    ttl: time::Duration,
    cookie_secure: bool,
    revocation: Option<RevocationList>,
}

impl SessionGuard {
    pub fn from_config(config: &config::AppConfig) -> Result<Self, AuthError> {
        let key_bytes = decode_key(&config.auth.key)?;
        Self::new(
            &key_bytes,
            &config.app_name,
            config.auth.session_ttl,
            config.auth.cookie_secure,
            config.auth.revocation,
        )
    }

    pub fn new(
        key_bytes: &[u8],
        issuer: &str,
        ttl: time::Duration,
        cookie_secure: bool,
        revocation: bool,
    ) -> Result<Self, AuthError> {
        if key_bytes.is_empty() {
            return Err(AuthError::InvalidKey);
        }
        if ttl.whole_seconds() <= 0 {
            return Err(AuthError::InvalidTtl);
        }
        Ok(Self {
            key: HS256Key::from_bytes(key_bytes),
            issuer: issuer.to_string(),
            ttl,
            cookie_secure,
            revocation: revocation.then(RevocationList::default),
        })
    }

    pub fn revocation_enabled(&self) -> bool {
        self.revocation.is_some()
    }

    /// Signs a token for `identity` and returns the `Set-Cookie` value.
    pub fn issue(&self, identity: &AdminIdentity) -> Result<String, AuthError> {
        let token = self.issue_token(identity)?;
        Ok(self.session_cookie(&token))
    }

    pub(crate) fn issue_token(&self, identity: &AdminIdentity) -> Result<String, AuthError> {
        let ttl_seconds =
            u64::try_from(self.ttl.whole_seconds()).map_err(|_| AuthError::InvalidTtl)?;
        let claims = Claims::with_custom_claims(
            SessionClaims::from(identity),
            JwtDuration::from_secs(ttl_seconds),
        )
        .with_subject(&identity.id)
        .with_issuer(&self.issuer)
        .with_jwt_id(generate_token_id());
        self.key.authenticate(claims).map_err(|_| AuthError::Signing)
    }

    pub(crate) fn session_cookie(&self, token: &str) -> String {
        let max_age = self.ttl.whole_seconds().max(0);
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path={SESSION_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age={max_age}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}=; Path={SESSION_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Resolves the request's session to an identity. Every failure mode is
    /// anonymous to the caller; the reason is only logged.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<AdminIdentity> {
        self.resolve_verified(headers)
            .await
            .map(|session| session.identity)
    }

    pub(crate) async fn resolve_verified(&self, headers: &HeaderMap) -> Option<VerifiedSession> {
        match self.check(headers).await {
            Ok(session) => Some(session),
            Err(Rejection::Missing) => {
                tracing::debug!("no session cookie");
                None
            }
            Err(Rejection::Malformed) => {
                tracing::warn!("rejected unverifiable session cookie");
                None
            }
            Err(Rejection::Revoked) => {
                tracing::warn!("rejected revoked session cookie");
                None
            }
        }
    }

    async fn check(&self, headers: &HeaderMap) -> Result<VerifiedSession, Rejection> {
        let token = session_cookie(headers).ok_or(Rejection::Missing)?;
        if token.is_empty() {
            return Err(Rejection::Missing);
        }
        let session = self.verify_token(token)?;
        if let Some(revocation) = &self.revocation
            && revocation.is_revoked(&session.token_id).await
        {
            return Err(Rejection::Revoked);
        }
        Ok(session)
    }

    fn verify_token(&self, token: &str) -> Result<VerifiedSession, Rejection> {
        let mut options = VerificationOptions::default();
        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        options.allowed_issuers = Some(issuers);
        options.time_tolerance = Some(JwtDuration::from_secs(CLOCK_SKEW_SECS));

        let claims = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|err| {
                tracing::debug!(error = %err, "session token failed verification");
                Rejection::Malformed
            })?;

        let expires_at = claims
            .expires_at
            .and_then(|at| i64::try_from(at.as_secs()).ok())
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            .ok_or(Rejection::Malformed)?;
        let token_id = claims.jwt_id.ok_or(Rejection::Malformed)?;
        if claims.custom.id.trim().is_empty() {
            return Err(Rejection::Malformed);
        }

        Ok(VerifiedSession {
            identity: claims.custom.into(),
            token_id,
            expires_at,
        })
    }

    /// Makes `session` unusable before its natural expiry. A no-op when
    /// revocation is disabled.
    pub(crate) async fn revoke(&self, session: &VerifiedSession) {
        let Some(revocation) = &self.revocation else {
            return;
        };
        revocation
            .revoke(&session.token_id, session.expires_at, OffsetDateTime::now_utc())
            .await;
        tracing::info!(admin_id = %session.identity.id, "session revoked");
    }
}

pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    for header in headers.get_all(COOKIE).iter() {
        if let Ok(raw) = header.to_str()
            && let Some(value) = cookie_from_header(raw, SESSION_COOKIE_NAME)
        {
            return Some(value);
        }
    }
    None
}

fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some((cookie_name, cookie_value)) = trimmed.split_once('=')
            && cookie_name == name
        {
            return Some(cookie_value);
        }
    }
    None
}

fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    encode_config(bytes, URL_SAFE_NO_PAD)
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_session_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_session_key_with_rng(&mut rng)
}

pub(crate) fn generate_session_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jwt_simple::prelude::Clock;

    pub(crate) const TEST_KEY: &[u8] = b"backoffice-test-session-key";

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for value in dest.iter_mut() {
                *value = 0;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    pub(crate) fn identity() -> AdminIdentity {
        AdminIdentity {
            id: "admin-1".to_string(),
            email: "ada@studio.example".to_string(),
            name: "Ada".to_string(),
            role: Role::Administrator,
        }
    }

    fn guard(revocation: bool) -> SessionGuard {
        SessionGuard::new(TEST_KEY, "Backoffice", time::Duration::days(7), false, revocation)
            .expect("session guard")
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE_NAME}={token}"))
                .expect("cookie header"),
        );
        headers
    }

    #[test]
    fn generate_session_key_with_rng__should_match_fixture() {
        // Given
        let mut rng = ZeroRng;

        // When
        let key = generate_session_key_with_rng(&mut rng).expect("session key");

        // Then
        assert_eq!(key, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn issue__should_build_http_only_cookie_scoped_to_admin() {
        // Given
        let guard = guard(true);

        // When
        let cookie = guard.issue(&identity()).expect("issue");

        // Then
        assert!(cookie.starts_with("admin_session="));
        assert!(cookie.contains("Path=/admin"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn resolve__should_return_identity_encoded_at_issuance() {
        // Given
        let guard = guard(true);
        let token = guard.issue_token(&identity()).expect("token");

        // When
        let resolved = guard.resolve(&headers_with(&token)).await;

        // Then
        assert_eq!(resolved, Some(identity()));
    }

    #[tokio::test]
    async fn resolve__should_treat_missing_corrupt_and_foreign_tokens_as_anonymous() {
        // Given
        let guard = guard(true);
        let other = SessionGuard::new(
            b"another-key",
            "Backoffice",
            time::Duration::days(7),
            false,
            true,
        )
        .expect("other guard");
        let foreign = other.issue_token(&identity()).expect("token");

        // Then
        assert_eq!(guard.resolve(&HeaderMap::new()).await, None);
        assert_eq!(guard.resolve(&headers_with("")).await, None);
        assert_eq!(guard.resolve(&headers_with("not-a-token")).await, None);
        assert_eq!(guard.resolve(&headers_with(&foreign)).await, None);
    }

    #[tokio::test]
    async fn resolve__should_reject_expired_token() {
        // Given
        let guard = guard(true);
        let mut claims = Claims::with_custom_claims(
            SessionClaims::from(&identity()),
            JwtDuration::from_secs(60),
        )
        .with_issuer("Backoffice")
        .with_jwt_id("expired");
        let long_ago = Clock::now_since_epoch() - JwtDuration::from_secs(3600);
        claims.issued_at = Some(long_ago);
        claims.invalid_before = Some(long_ago);
        claims.expires_at = Some(long_ago + JwtDuration::from_secs(60));
        let token = HS256Key::from_bytes(TEST_KEY)
            .authenticate(claims)
            .expect("token");

        // When
        let resolved = guard.resolve(&headers_with(&token)).await;

        // Then
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn revoke__should_reject_replayed_token_when_enabled() {
        // Given
        let guard = guard(true);
        let token = guard.issue_token(&identity()).expect("token");
        let session = guard
            .resolve_verified(&headers_with(&token))
            .await
            .expect("session");

        // When
        guard.revoke(&session).await;

        // Then
        assert_eq!(guard.resolve(&headers_with(&token)).await, None);
    }

    #[tokio::test]
    async fn revoke__should_leave_token_valid_when_disabled() {
        // Given
        let guard = guard(false);
        let token = guard.issue_token(&identity()).expect("token");
        let session = guard
            .resolve_verified(&headers_with(&token))
            .await
            .expect("session");

        // When
        guard.revoke(&session).await;

        // Then
        assert_eq!(guard.resolve(&headers_with(&token)).await, Some(identity()));
    }

    #[test]
    fn new__should_reject_empty_key_and_non_positive_ttl() {
        // Then
        assert!(matches!(
            SessionGuard::new(b"", "Backoffice", time::Duration::days(1), false, true),
            Err(AuthError::InvalidKey)
        ));
        assert!(matches!(
            SessionGuard::new(TEST_KEY, "Backoffice", time::Duration::ZERO, false, true),
            Err(AuthError::InvalidTtl)
        ));
    }
}

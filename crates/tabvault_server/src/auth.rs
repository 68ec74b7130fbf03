//! Token issuance and verification.
//!
//! Tokens are self-contained HMAC-SHA256 credentials. Verification checks the
//! signature and the expiry and nothing else; there is no revocation list.
//!
//! ## Token Format
//!
//! Standard HS256 JWTs signed with `jsonwebtoken`. Claims are
//! `{"sub", "iat", "exp"}` in Unix seconds. A token is valid while
//! `now < exp`.
//!
//! The signing secret lives for the process only: restarting the server
//! invalidates every outstanding token.

use crate::audit::{EventLog, SessionRecord};
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Length of a generated signing secret in bytes.
pub const SECRET_LEN: usize = 32;

/// Process-lifetime signing key. Immutable once constructed.
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    /// Generates a fresh random secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(Arc::from(&bytes[..]))
    }

    /// Wraps caller-provided key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(..)")
    }
}

/// Signed token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal name.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: u64,
    /// Expiry, Unix seconds.
    pub exp: u64,
}

/// A freshly issued token and its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Opaque token string to hand to the holder.
    pub token: String,
    /// Principal the token names.
    pub principal: String,
    /// Issuance time, Unix seconds.
    pub issued_at: u64,
    /// First second at which the token is rejected, Unix seconds.
    pub expires_at: u64,
}

/// Issues and verifies tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry: Duration,
    audit: Option<Arc<EventLog>>,
}

impl TokenService {
    /// Creates a service signing with `secret`; tokens live for `expiry`.
    pub fn new(secret: SigningSecret, expiry: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry,
            audit: None,
        }
    }

    /// Records a [`SessionRecord`] in `log` for every issued token.
    pub fn with_audit_log(mut self, log: Arc<EventLog>) -> Self {
        self.audit = Some(log);
        self
    }

    /// Token lifetime.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Issues a token for `principal`, valid from now.
    pub fn issue(&self, principal: &str) -> ServerResult<IssuedToken> {
        self.issue_at(principal, SystemTime::now())
    }

    /// Issues a token as if the current time were `now`.
    ///
    /// The audit append is fire-and-forget: a failure is logged and the
    /// token is still returned.
    ///
    /// # Errors
    ///
    /// `Internal` if signing fails, which HS256 with an in-memory key does
    /// not do in practice.
    pub fn issue_at(&self, principal: &str, now: SystemTime) -> ServerResult<IssuedToken> {
        let iat = unix_seconds(now);
        let claims = Claims {
            sub: principal.to_string(),
            iat,
            exp: iat.saturating_add(self.expiry.as_secs()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))?;
        let issued = IssuedToken {
            token,
            principal: principal.to_string(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        };

        if let Some(log) = &self.audit {
            let record = SessionRecord {
                principal: issued.principal.clone(),
                token: issued.token.clone(),
                issued_at: DateTime::<Utc>::from(now).to_rfc3339_opts(SecondsFormat::Micros, true),
            };
            if let Err(e) = log.append(&record) {
                warn!(principal, error = %e, "failed to record session");
            }
        }

        info!(principal, "issued token");
        Ok(issued)
    }

    /// Verifies a token and returns its principal.
    pub fn verify(&self, token: &str) -> ServerResult<String> {
        self.verify_at(token, SystemTime::now())
    }

    /// Verifies a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// `InvalidToken` if the token is malformed, its signature does not match
    /// this service's secret, or `now` is at or past its expiry.
    pub fn verify_at(&self, token: &str, now: SystemTime) -> ServerResult<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| ServerError::InvalidToken(e.to_string()))?;

        if unix_seconds(now) >= data.claims.exp {
            return Err(ServerError::InvalidToken("token expired".to_string()));
        }
        Ok(data.claims.sub)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("expiry", &self.expiry)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

fn unix_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn service() -> TokenService {
        TokenService::new(
            SigningSecret::from_bytes(b"test-secret-key-32-bytes-long!!".to_vec()),
            DAY,
        )
    }

    #[test]
    fn issue_then_verify_returns_principal() {
        let tokens = service();
        let issued = tokens.issue("alice").unwrap();
        assert_eq!(tokens.verify(&issued.token).unwrap(), "alice");
        assert_eq!(issued.expires_at - issued.issued_at, DAY.as_secs());
    }

    #[test]
    fn token_has_jwt_shape() {
        let issued = service().issue("alice").unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert!(!issued.token.contains('='));
    }

    #[test]
    fn valid_until_just_before_expiry() {
        let tokens = service();
        let t0 = UNIX_EPOCH + Duration::from_secs(1_800_000_000);
        let issued = tokens.issue_at("alice", t0).unwrap();

        let almost = t0 + DAY - Duration::from_secs(1);
        assert_eq!(tokens.verify_at(&issued.token, almost).unwrap(), "alice");
        assert!(matches!(
            tokens.verify_at(&issued.token, t0 + DAY),
            Err(ServerError::InvalidToken(_))
        ));
    }

    #[test]
    fn reject_expired_token() {
        let tokens = TokenService::new(SigningSecret::from_bytes(b"k".to_vec()), Duration::ZERO);
        let issued = tokens.issue("alice").unwrap();
        assert!(tokens.verify(&issued.token).is_err());
    }

    #[test]
    fn reject_tampered_token() {
        let tokens = service();
        let issued = tokens.issue("alice").unwrap();
        let mallory = TokenService::new(SigningSecret::generate(), DAY)
            .issue("mallory")
            .unwrap();

        let parts: Vec<&str> = issued.token.split('.').collect();
        let forged_claims = mallory.token.split('.').nth(1).unwrap();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(matches!(
            tokens.verify(&forged),
            Err(ServerError::InvalidToken(_))
        ));
    }

    #[test]
    fn reject_other_algorithm() {
        let secret = b"test-secret-key-32-bytes-long!!";
        let claims = Claims {
            sub: "alice".into(),
            iat: 0,
            exp: u64::MAX / 2,
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        assert!(matches!(
            service().verify(&token),
            Err(ServerError::InvalidToken(_))
        ));
    }

    #[test]
    fn huge_expiry_saturates() {
        let tokens = TokenService::new(SigningSecret::generate(), Duration::from_secs(u64::MAX));
        let issued = tokens.issue("alice").unwrap();
        assert_eq!(issued.expires_at, u64::MAX);
        assert_eq!(tokens.verify(&issued.token).unwrap(), "alice");
    }

    #[test]
    fn reject_other_secret() {
        let issued = service().issue("alice").unwrap();
        let other = TokenService::new(SigningSecret::generate(), DAY);
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn reject_malformed_tokens() {
        let tokens = service();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(
                matches!(tokens.verify(token), Err(ServerError::InvalidToken(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn generated_secrets_differ() {
        let a = TokenService::new(SigningSecret::generate(), DAY);
        let b = TokenService::new(SigningSecret::generate(), DAY);
        let issued = a.issue("alice").unwrap();
        assert!(a.verify(&issued.token).is_ok());
        assert!(b.verify(&issued.token).is_err());
    }

    #[test]
    fn issuance_is_audited() {
        let log = Arc::new(EventLog::in_memory());
        let tokens = service().with_audit_log(Arc::clone(&log));

        let issued = tokens.issue("alice").unwrap();

        let records: Vec<SessionRecord> = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].principal, "alice");
        assert_eq!(records[0].token, issued.token);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SigningSecret::from_bytes(b"hunter2".to_vec());
        assert_eq!(format!("{secret:?}"), "SigningSecret(..)");
    }
}

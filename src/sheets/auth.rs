//! Service-account authentication.
//!
//! A signed JWT assertion is exchanged for a short-lived bearer token at the
//! credential's `token_uri`. [`AuthSession`] caches that token for the life of
//! the process: it is fetched on first use, reused until shortly before it
//! expires, and dropped explicitly when the API rejects it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::SheetError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for each assertion; the token endpoint caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account JSON key that the token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SheetError> {
        serde_json::from_str(json)
            .map_err(|e| SheetError::Auth(format!("invalid service account key: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetError::Auth(format!(
                "cannot read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub(crate) fn new(key: &ServiceAccountKey, scopes: &[String], now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: scopes.join(" "),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

fn sign_assertion(key: &ServiceAccountKey, claims: &Claims) -> Result<String, SheetError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetError::Auth(format!("invalid private key: {}", e)))?;
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    jsonwebtoken::encode(&header, claims, &encoding_key)
        .map_err(|e| SheetError::Auth(format!("failed to sign assertion: {}", e)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Expiry of a token issued at `now`; the endpoint's `expires_in` defaults to
/// the assertion lifetime.
fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> Result<DateTime<Utc>, SheetError> {
    let secs = expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| SheetError::Auth(format!("token lifetime out of range: {}s", secs)))
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

enum CredentialSource {
    File(PathBuf),
    Key(ServiceAccountKey),
}

/// Process-wide authentication state for one service account.
///
/// Shared through `Arc` by every client that talks to the same account. The
/// token lock is held across the exchange so concurrent callers wait for one
/// fetch instead of racing.
pub struct AuthSession {
    source: CredentialSource,
    scopes: Vec<String>,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl AuthSession {
    /// Session whose key file is only read when a token is first needed, so
    /// a missing or broken file surfaces as [`SheetError::Auth`] at first use.
    pub fn from_file(path: impl Into<PathBuf>, scopes: Vec<String>, http: reqwest::Client) -> Self {
        Self::with_source(CredentialSource::File(path.into()), scopes, http)
    }

    pub fn from_key(key: ServiceAccountKey, scopes: Vec<String>, http: reqwest::Client) -> Self {
        Self::with_source(CredentialSource::Key(key), scopes, http)
    }

    fn with_source(source: CredentialSource, scopes: Vec<String>, http: reqwest::Client) -> Self {
        let scopes = if scopes.is_empty() {
            vec![SPREADSHEETS_SCOPE.to_string()]
        } else {
            scopes
        };
        Self {
            source,
            scopes,
            http,
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, authenticating if there is none or it expired.
    pub async fn bearer(&self) -> Result<String, SheetError> {
        let mut guard = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token(now).await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Drop the cached token; the next request authenticates again.
    pub async fn invalidate(&self) {
        let mut guard = self.token.lock().await;
        if guard.take().is_some() {
            log::warn!("AuthSession: cached token rejected, will re-authenticate");
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed_token(&self, value: &str, expires_at: DateTime<Utc>) {
        *self.token.lock().await = Some(AccessToken {
            value: value.to_string(),
            expires_at,
        });
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| t.is_fresh(Utc::now()))
    }

    fn load_key(&self) -> Result<ServiceAccountKey, SheetError> {
        match &self.source {
            CredentialSource::File(path) => ServiceAccountKey::from_file(path),
            CredentialSource::Key(key) => Ok(key.clone()),
        }
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> Result<AccessToken, SheetError> {
        let key = self.load_key()?;
        let claims = Claims::new(&key, &self.scopes, now);
        let assertion = sign_assertion(&key, &claims)?;

        log::debug!("AuthSession: exchanging assertion for {}", key.client_email);
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SheetError::Auth(format!(
                "token exchange failed ({}): {}",
                status, error_text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetError::Auth(format!("malformed token response: {}", e)))?;

        let expires_at = token_expiry(now, body.expires_in)?;
        log::info!("AuthSession: authenticated as {}", key.client_email);
        Ok(AccessToken {
            value: body.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_key() -> ServiceAccountKey {
        ServiceAccountKey::from_json(
            r#"{
                "type": "service_account",
                "client_email": "bot@project.iam.gserviceaccount.com",
                "private_key": "not a pem",
                "private_key_id": "k1"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_key_defaults_token_uri() {
        let key = sample_key();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.private_key_id.as_deref(), Some("k1"));
    }

    #[test]
    fn test_key_debug_redacts_private_key() {
        let printed = format!("{:?}", sample_key());
        assert!(!printed.contains("not a pem"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_missing_fields_is_auth_error() {
        let err = ServiceAccountKey::from_json(r#"{"client_email": "x"}"#).unwrap_err();
        assert!(matches!(err, SheetError::Auth(_)));
    }

    #[test]
    fn test_claims() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let scopes = vec![SPREADSHEETS_SCOPE.to_string(), "extra".to_string()];
        let claims = Claims::new(&sample_key(), &scopes, now);
        assert_eq!(claims.iss, "bot@project.iam.gserviceaccount.com");
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.scope, format!("{} extra", SPREADSHEETS_SCOPE));
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_invalid_pem_is_auth_error() {
        let key = sample_key();
        let claims = Claims::new(&key, &[SPREADSHEETS_SCOPE.to_string()], Utc::now());
        assert!(matches!(sign_assertion(&key, &claims), Err(SheetError::Auth(_))));
    }

    #[test]
    fn test_token_freshness() {
        let now = Utc::now();
        let token = AccessToken {
            value: "t".into(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));
        let token = AccessToken {
            value: "t".into(),
            expires_at: now + Duration::seconds(600),
        };
        assert!(token.is_fresh(now));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            token_expiry(now, Some(120)).unwrap(),
            now + Duration::seconds(120)
        );
        assert_eq!(
            token_expiry(now, None).unwrap(),
            now + Duration::seconds(ASSERTION_LIFETIME_SECS)
        );
        assert!(matches!(token_expiry(now, Some(i64::MAX)), Err(SheetError::Auth(_))));
    }

    #[tokio::test]
    async fn test_cached_token_reused_until_invalidated() {
        let session = AuthSession::from_key(sample_key(), Vec::new(), reqwest::Client::new());
        session
            .seed_token("cached", Utc::now() + Duration::seconds(600))
            .await;
        assert!(session.is_authenticated().await);
        assert_eq!(session.bearer().await.unwrap(), "cached");

        session.invalidate().await;
        assert!(!session.is_authenticated().await);
        // The key cannot sign, so re-authenticating fails instead of reusing.
        assert!(matches!(session.bearer().await, Err(SheetError::Auth(_))));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails_at_first_use() {
        let session = AuthSession::from_file(
            "/nonexistent/service-account.json",
            Vec::new(),
            reqwest::Client::new(),
        );
        assert!(!session.is_authenticated().await);
        let err = session.bearer().await.unwrap_err();
        assert!(matches!(err, SheetError::Auth(_)));
    }
}

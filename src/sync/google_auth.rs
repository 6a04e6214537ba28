use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const REFRESH_BUFFER_SECONDS: i64 = 60;
const MAX_CACHE_SECONDS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("can't read project key file {}: {}", path.display(), source)]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse service account key: {0}")]
    CredentialParse(String),
    #[error("can't make calendar service: {0}")]
    ServiceInit(String),
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(data: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(data).map_err(|e| AuthError::CredentialParse(e.to_string()))
    }

    pub async fn read(path: &Path) -> Result<Self, AuthError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| AuthError::CredentialRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&data)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

/// A service-account key loaded for RS256 signing, bound to one scope and
/// an optional impersonation subject.
pub struct ServiceAccountSigner {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    subject: Option<String>,
}

impl ServiceAccountSigner {
    pub fn new(key: ServiceAccountKey, scope: &str) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AuthError::CredentialParse(format!("invalid private key: {}", e)))?;

        Ok(Self {
            key,
            encoding_key,
            scope: scope.to_string(),
            subject: None,
        })
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject.filter(|s| !s.is_empty());
        self
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn token_uri(&self) -> &str {
        &self.key.token_uri
    }

    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
            sub: self.subject.as_deref(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::CredentialParse(format!("can't sign JWT: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl TokenInfo {
    pub fn new(access_token: String, expires_in_seconds: i64) -> Self {
        Self {
            access_token,
            expires_at: Utc::now() + TimeDelta::seconds(expires_in_seconds),
            token_type: "Bearer".to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    pub fn needs_refresh(&self) -> bool {
        self.expires_at <= Utc::now() + TimeDelta::seconds(REFRESH_BUFFER_SECONDS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECONDS
}

/// Exchanges signed service-account assertions for access tokens.
#[derive(Debug, Clone)]
pub struct GoogleAuthenticator {
    client: reqwest::Client,
}

impl GoogleAuthenticator {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn exchange(&self, signer: &ServiceAccountSigner) -> Result<TokenInfo, AuthError> {
        let assertion = signer.assertion(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        tracing::info!(
            "Requesting access token for {} (subject: {})",
            signer.client_email(),
            signer.subject().unwrap_or("none")
        );

        let response = self
            .client
            .post(signer.token_uri())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ServiceInit(format!("token request failed: {}", e)))?;

        let status = response.status();
        tracing::info!("Token endpoint response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange rejected. Status: {}, Body: {}", status, body);
            return Err(AuthError::ServiceInit(format!("token endpoint returned {}: {}", status, body)));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ServiceInit(format!("malformed token response: {}", e)))?;

        let mut token = TokenInfo::new(token_response.access_token, token_response.expires_in);
        if let Some(token_type) = token_response.token_type {
            token.token_type = token_type;
        }
        Ok(token)
    }
}

/// Who a cached token was minted for. A token is only handed back to the
/// same key file and impersonation subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOwner {
    pub credentials_path: PathBuf,
    pub subject: Option<String>,
}

impl TokenOwner {
    pub fn new(credentials_path: impl Into<PathBuf>, subject: Option<String>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            subject,
        }
    }
}

#[derive(Debug)]
struct CachedToken {
    owner: TokenOwner,
    token: TokenInfo,
    fetched_at: DateTime<Utc>,
}

/// Holds at most one access token for a bounded time. Shared between
/// clones of a client; the lock is never held across an await.
#[derive(Debug)]
pub struct TokenCache {
    max_age: TimeDelta,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(max_age_seconds: u64) -> Self {
        Self {
            max_age: TimeDelta::seconds(max_age_seconds.min(MAX_CACHE_SECONDS) as i64),
            slot: Mutex::new(None),
        }
    }

    pub fn get(&self, owner: &TokenOwner) -> Option<TokenInfo> {
        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(cached)
                if cached.owner == *owner
                    && !cached.token.needs_refresh()
                    && cached.fetched_at + self.max_age > Utc::now() =>
            {
                Some(cached.token.clone())
            }
            _ => None,
        }
    }

    /// Replaces whatever is cached, including a token of another owner.
    pub fn store(&self, owner: TokenOwner, token: TokenInfo) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(CachedToken {
            owner,
            token,
            fetched_at: Utc::now(),
        });
    }

    /// Forgets `access_token` if it is the cached one.
    pub fn discard(&self, access_token: &str) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.as_ref().is_some_and(|cached| cached.token.access_token == access_token) {
            *slot = None;
            return true;
        }
        false
    }
}

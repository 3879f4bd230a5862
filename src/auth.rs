//! Service account authentication for Google APIs.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{DriveError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens this close to expiry are refreshed instead of reused.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount {
        client_email: String,
        key: EncodingKey,
        token_uri: String,
    },
    Fixed(String),
}

/// Authenticator for Google APIs using service account credentials.
///
/// Clones share the same token cache.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DriveError::CredentialsFileError {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Self::new(credentials)
    }

    /// Create a new authenticator from credentials.
    ///
    /// The private key is parsed here, so a malformed key fails construction
    /// instead of the first request.
    pub fn new(credentials: ServiceAccountCredentials) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|e| {
            DriveError::AuthenticationError(format!("invalid service account private key: {}", e))
        })?;

        let source = TokenSource::ServiceAccount {
            client_email: credentials.client_email,
            key,
            token_uri: credentials.token_uri.unwrap_or_else(|| TOKEN_URI.to_string()),
        };
        Ok(Self::with_source(source))
    }

    /// Use an access token obtained elsewhere. It is never refreshed.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Fixed(token.into()))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let (client_email, key, token_uri) = match self.source.as_ref() {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount {
                client_email,
                key,
                token_uri,
            } => (client_email, key, token_uri),
        };

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = self.refresh_token(client_email, key, token_uri).await?;
        *cached = Some(new_token.clone());

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_token(
        &self,
        client_email: &str,
        key: &EncodingKey,
        token_uri: &str,
    ) -> Result<CachedToken> {
        tracing::debug!(%client_email, %token_uri, "requesting access token");

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let claims = Claims {
            iss: client_email.to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        let response = self.client.post(token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

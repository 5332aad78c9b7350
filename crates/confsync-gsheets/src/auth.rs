//! Service account authentication for the Sheets API.
//!
//! A JWT signed with the service account key is exchanged for an OAuth2
//! access token (`urn:ietf:params:oauth:grant-type:jwt-bearer`).

use confsync_core::{Credentials, SyncError};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The two fields of a service account key the Sheets backend needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Resolve the service account: key file if it exists, else the key/email pair.
pub fn load_service_account(credentials: &Credentials) -> Result<ServiceAccountKey, SyncError> {
    if let Some(path) = credentials
        .google_service_account_file
        .as_ref()
        .filter(|p| p.exists())
    {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SyncError::MissingCredentials(format!(
                "Cannot read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&text).map_err(|e| {
            SyncError::MissingCredentials(format!(
                "Invalid service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded service account {} from file", key.client_email);
        return Ok(key);
    }

    let private_key = credentials
        .google_private_key
        .as_deref()
        .filter(|k| !k.trim().is_empty());
    let client_email = credentials
        .google_service_account_email
        .as_deref()
        .filter(|e| !e.trim().is_empty());

    match (private_key, client_email) {
        (Some(private_key), Some(client_email)) => Ok(ServiceAccountKey {
            client_email: client_email.to_string(),
            // Keys passed through environment variables usually carry escaped newlines
            private_key: private_key.replace("\\n", "\n"),
        }),
        _ => Err(SyncError::MissingCredentials(
            "Google service account is not configured (GOOGLE_SERVICE_ACCOUNT_FILE or \
             GOOGLE_PRIVATE_KEY + GOOGLE_SERVICE_ACCOUNT_EMAIL)"
                .to_string(),
        )),
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign the JWT assertion sent to the token endpoint.
pub fn sign_assertion(key: &ServiceAccountKey, token_url: &str) -> Result<String, SyncError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        SyncError::MissingCredentials(format!("Invalid service account private key: {}", e))
    })?;

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: token_url,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SyncError::MissingCredentials(format!("Cannot sign JWT: {}", e)))
}

/// Exchange a service account key for an access token.
#[instrument(skip(http, key), level = "debug", fields(client_email = %key.client_email))]
pub async fn fetch_access_token(
    http: &Client,
    oauth_base_url: &str,
    key: &ServiceAccountKey,
) -> Result<String, SyncError> {
    let token_url = format!("{}/token", oauth_base_url);
    let assertion = sign_assertion(key, &token_url)?;

    let resp = http
        .post(&token_url)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| SyncError::Connection(format!("Token request failed: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Connection(format!(
            "Service account token exchange failed {}: {}",
            status, body
        )));
    }

    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
    }

    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| SyncError::Connection(format!("Unexpected token response: {}", e)))?;

    debug!("Obtained access token for {}", key.client_email);
    Ok(token.access_token)
}

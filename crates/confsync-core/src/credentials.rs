use std::path::PathBuf;

use crate::error::SyncError;

/// Credential material handed to backend connectors.
///
/// Populated by the caller (CLI flags / environment); connectors never read
/// the process environment themselves.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Document store connection URL (`MONGO_URL`)
    pub mongo_url: Option<String>,
    /// Graph store connection URL (`ARANGO_URL`)
    pub arango_url: Option<String>,
    /// Path to a Google service account JSON key file
    pub google_service_account_file: Option<PathBuf>,
    /// Service account private key (PEM)
    pub google_private_key: Option<String>,
    /// Service account client email
    pub google_service_account_email: Option<String>,
}

impl Credentials {
    /// Document store URL: explicit credential first, then the descriptor
    /// itself when it is a connection URL.
    pub fn mongo_url(&self, descriptor: &str) -> Result<String, SyncError> {
        if let Some(url) = non_empty(&self.mongo_url) {
            return Ok(url.to_string());
        }
        if descriptor.starts_with("mongodb://") || descriptor.starts_with("mongodb+srv://") {
            return Ok(descriptor.to_string());
        }
        Err(SyncError::MissingCredentials(
            "MONGO_URL is not set and the source is not a MongoDB URL".to_string(),
        ))
    }

    /// Graph store URL: explicit credential first, then an `http(s)://arango…`
    /// descriptor.
    pub fn arango_url(&self, descriptor: &str) -> Result<String, SyncError> {
        if let Some(url) = non_empty(&self.arango_url) {
            return Ok(url.to_string());
        }
        let is_url = ["http://arango", "https://arango"]
            .iter()
            .any(|prefix| descriptor.starts_with(prefix));
        if is_url {
            return Ok(descriptor.to_string());
        }
        Err(SyncError::MissingCredentials(
            "ARANGO_URL is not set and the source is not an ArangoDB URL".to_string(),
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongo_url_prefers_credential() {
        let creds = Credentials {
            mongo_url: Some("mongodb://db.internal/configs".into()),
            ..Default::default()
        };
        assert_eq!(
            creds.mongo_url("mongodb://other/x").unwrap(),
            "mongodb://db.internal/configs"
        );
    }

    #[test]
    fn test_mongo_url_from_descriptor() {
        let creds = Credentials::default();
        assert_eq!(
            creds.mongo_url("mongodb+srv://cluster0.example.net/app").unwrap(),
            "mongodb+srv://cluster0.example.net/app"
        );
        assert!(matches!(
            creds.mongo_url("mongo"),
            Err(SyncError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let creds = Credentials {
            arango_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            creds.arango_url("arango"),
            Err(SyncError::MissingCredentials(_))
        ));
        assert_eq!(
            creds.arango_url("https://arangodb.local:8529/configs").unwrap(),
            "https://arangodb.local:8529/configs"
        );
    }
}

use thiserror::Error;

/// Errors raised while moving records between local files and a remote store.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid source \"{0}\" specified. Valid sources must be 'arango', 'mongo', a MongoDB URL or a Google Sheets URL")]
    UnrecognizedSource(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Malformed JSON in {path}: {message}")]
    MalformedJson { path: String, message: String },

    #[error("Malformed YAML for {key}: {message}")]
    MalformedYaml { key: String, message: String },

    #[error("Invalid input shape for {key}: {message}")]
    InvalidInputShape { key: String, message: String },

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Remote error: {0}")]
    Remote(String),
}

impl SyncError {
    /// Whether this error stops a whole backend phase rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::UnrecognizedSource(_)
                | SyncError::Connection(_)
                | SyncError::MissingCredentials(_)
                | SyncError::SheetNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::UnrecognizedSource("x".into()).is_fatal());
        assert!(SyncError::Connection("down".into()).is_fatal());
        assert!(SyncError::MissingCredentials("MONGO_URL".into()).is_fatal());
        assert!(SyncError::SheetNotFound("prod".into()).is_fatal());

        assert!(!SyncError::Io("disk full".into()).is_fatal());
        assert!(!SyncError::Remote("409".into()).is_fatal());
        assert!(!SyncError::MalformedJson {
            path: "a.json".into(),
            message: "EOF".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_unrecognized_source_message() {
        let err = SyncError::UnrecognizedSource("not-a-real-source".into());
        assert!(err.to_string().contains("\"not-a-real-source\""));
    }
}

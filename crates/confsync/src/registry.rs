use confsync_arango::ArangoConnector;
use confsync_core::{Connector, SyncError};
use confsync_gsheets::{SheetsConfig, SheetsConnector};
use confsync_mongo::MongoConnector;
use tracing::debug;

/// Ordered list of connectors consulted for a source descriptor.
///
/// Every connector whose predicate matches runs, in registration order.
#[derive(Default)]
pub struct Registry {
    connectors: Vec<Box<dyn Connector>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// MongoDB, Google Sheets, then ArangoDB.
    pub fn with_defaults(sheets: SheetsConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(MongoConnector::new())
            .register(SheetsConnector::new(sheets))
            .register(ArangoConnector::new());
        registry
    }

    /// Append a connector after the existing ones.
    pub fn register(&mut self, connector: impl Connector + 'static) -> &mut Self {
        self.connectors.push(Box::new(connector));
        self
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Connectors matching `descriptor`, in order.
    ///
    /// # Errors
    /// `UnrecognizedSource` when nothing matches.
    pub fn resolve(&self, descriptor: &str) -> Result<Vec<&dyn Connector>, SyncError> {
        let matched: Vec<&dyn Connector> = self
            .connectors
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| c.matches(descriptor))
            .collect();

        if matched.is_empty() {
            return Err(SyncError::UnrecognizedSource(descriptor.to_string()));
        }

        debug!(
            "Source {} selects {}",
            descriptor,
            matched
                .iter()
                .map(|c| c.kind().display_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(matched)
    }
}

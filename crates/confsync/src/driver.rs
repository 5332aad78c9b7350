//! Sync driver: resolves backends for a source descriptor and moves every
//! item between the local directory and each selected store.
//!
//! Each backend runs as one phase:
//!
//! ```text
//! SelectingBackend -> Listing -> Transferring -> Done
//! ```
//!
//! Item failures are collected into the phase report and the batch goes on.
//! Setup failures (credentials, connect, listing) stop the phase. The
//! connection is closed exactly once per phase in either case.
//!
//! Only a phase that never got a connection makes the exit code non-zero.

use std::fmt;
use std::path::{Path, PathBuf};

use confsync_core::{codec, BackendKind, Connector, Credentials, RecordStore, SyncError};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::registry::Registry;

/// Direction of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Local files to the remote store.
    Init,
    /// Remote store to local files.
    #[default]
    Pull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SelectingBackend,
    Listing,
    Transferring,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SelectingBackend => "connect",
            Stage::Listing => "listing",
            Stage::Transferring => "transferring",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What to sync, where, and in which direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Source descriptor used to pick backends (`mongo`, a URL, ...).
    pub source_kind: String,
    /// Collection or sheet name.
    pub source: String,
    pub directory: PathBuf,
    pub mode: Mode,
    /// Accepted for compatibility; only logged.
    pub query: Option<String>,
}

/// Outcome of one file (init) or one record (pull).
#[derive(Debug)]
pub struct ItemResult {
    pub item: String,
    pub outcome: Result<(), SyncError>,
}

impl ItemResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A setup error that stopped a phase, with the stage it happened in.
#[derive(Debug)]
pub struct PhaseFailure {
    pub stage: Stage,
    pub error: SyncError,
}

/// Everything that happened while syncing with one backend.
#[derive(Debug)]
pub struct PhaseReport {
    pub backend: BackendKind,
    pub stage: Stage,
    pub items: Vec<ItemResult>,
    pub failure: Option<PhaseFailure>,
}

impl PhaseReport {
    fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            stage: Stage::SelectingBackend,
            items: Vec::new(),
            failure: None,
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug!("{}: {} -> {}", self.backend, self.stage, stage);
        self.stage = stage;
    }

    fn record(&mut self, item: String, outcome: Result<(), SyncError>) {
        match &outcome {
            Ok(()) => debug!("{}: {} synced", self.backend, item),
            Err(e) => warn!("{}: {} failed: {}", self.backend, item, e),
        }
        self.items.push(ItemResult { item, outcome });
    }

    fn fail(&mut self, error: SyncError) {
        error!("{}: {} failed: {}", self.backend, self.stage, error);
        self.failure = Some(PhaseFailure {
            stage: self.stage,
            error,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_ok()).count()
    }

    /// Items whose transfer failed.
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| !i.is_ok())
    }

    /// Whether a setup error stopped the phase.
    pub fn is_fatal(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether the phase stopped before a connection was open (credentials
    /// or connect).
    pub fn failed_to_connect(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.stage == Stage::SelectingBackend)
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct SyncReport {
    pub mode: Mode,
    pub source_kind: String,
    pub phases: Vec<PhaseReport>,
}

impl SyncReport {
    /// Non-zero when a phase could not connect. Listing and item failures
    /// are reported but keep 0.
    pub fn exit_code(&self) -> i32 {
        if self.phases.iter().any(PhaseReport::failed_to_connect) {
            1
        } else {
            0
        }
    }

    pub fn failure_count(&self) -> usize {
        self.phases
            .iter()
            .map(|p| p.failed_items().count() + usize::from(p.is_fatal()))
            .sum()
    }

    /// Final status line followed by one line per failure.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.phases.iter().any(PhaseReport::is_fatal) {
            let verb = match self.mode {
                Mode::Init => "initialized to",
                Mode::Pull => "loaded from",
            };
            lines.push(format!("> SUCCESS: Configs are {}: {}", verb, self.source_kind));
        } else {
            let verb = match self.mode {
                Mode::Init => "initialize configs to",
                Mode::Pull => "load configs from",
            };
            lines.push(format!("> FAILED: Could not {}: {}", verb, self.source_kind));
        }

        for phase in &self.phases {
            if let Some(failure) = &phase.failure {
                lines.push(format!(
                    "  - [{}] {} failed: {}",
                    phase.backend, failure.stage, failure.error
                ));
            }
            for item in phase.failed_items() {
                if let Err(e) = &item.outcome {
                    lines.push(format!("  - [{}] {}: {}", phase.backend, item.item, e));
                }
            }
        }
        lines
    }
}

/// Runs sync phases against the connectors of a [`Registry`].
pub struct SyncDriver {
    registry: Registry,
    credentials: Credentials,
}

impl SyncDriver {
    pub fn new(registry: Registry, credentials: Credentials) -> Self {
        Self {
            registry,
            credentials,
        }
    }

    /// Run every backend matching `config.source_kind`, one after the other.
    ///
    /// # Errors
    /// `UnrecognizedSource` when no backend matches; nothing is read or
    /// written in that case. All other failures end up in the report.
    #[instrument(skip(self, config), level = "debug", fields(source_kind = %config.source_kind, mode = ?config.mode))]
    pub async fn run(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        let connectors = self.registry.resolve(&config.source_kind)?;

        if let Some(query) = &config.query {
            info!("Query {} is accepted but not applied", query);
        }

        let mut phases = Vec::with_capacity(connectors.len());
        for connector in connectors {
            phases.push(self.run_phase(connector, config).await);
        }

        Ok(SyncReport {
            mode: config.mode,
            source_kind: config.source_kind.clone(),
            phases,
        })
    }

    async fn run_phase(&self, connector: &dyn Connector, config: &SyncConfig) -> PhaseReport {
        let mut phase = PhaseReport::new(connector.kind());
        info!(
            "{}: {} {} ({})",
            phase.backend,
            match config.mode {
                Mode::Init => "pushing",
                Mode::Pull => "pulling",
            },
            config.source,
            config.directory.display()
        );

        let store = match connector
            .connect(&config.source_kind, &self.credentials)
            .await
        {
            Ok(store) => store,
            Err(e) => {
                phase.fail(e);
                phase.advance(Stage::Done);
                return phase;
            }
        };

        phase.advance(Stage::Listing);
        let outcome = match config.mode {
            Mode::Init => push(store.as_ref(), config, &mut phase).await,
            Mode::Pull => pull(store.as_ref(), config, &mut phase).await,
        };
        if let Err(e) = outcome {
            phase.fail(e);
        }

        if let Err(e) = store.close().await {
            warn!("{}: failed to close connection: {}", phase.backend, e);
        }

        phase.advance(Stage::Done);
        info!(
            "{}: {} synced, {} failed",
            phase.backend,
            phase.succeeded(),
            phase.failed_items().count()
        );
        phase
    }
}

async fn push(
    store: &dyn RecordStore,
    config: &SyncConfig,
    phase: &mut PhaseReport,
) -> Result<(), SyncError> {
    let files = codec::list_local(&config.directory).await?;
    store.prepare_push(&config.source).await?;

    phase.advance(Stage::Transferring);
    for path in files {
        let outcome = push_file(store, &config.source, &path).await;
        phase.record(item_name(&path), outcome);
    }
    Ok(())
}

async fn push_file(store: &dyn RecordStore, collection: &str, path: &Path) -> Result<(), SyncError> {
    let record = codec::decode(path).await?;
    store.upsert(collection, &record).await?;
    Ok(())
}

async fn pull(
    store: &dyn RecordStore,
    config: &SyncConfig,
    phase: &mut PhaseReport,
) -> Result<(), SyncError> {
    let entries = store.list_all(&config.source).await?;
    fs::create_dir_all(&config.directory).await.map_err(|e| {
        SyncError::Io(format!(
            "Failed to create {}: {}",
            config.directory.display(),
            e
        ))
    })?;

    phase.advance(Stage::Transferring);
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            Ok(record) => {
                let outcome = codec::encode(&record, &config.directory).await.map(|_| ());
                phase.record(record.file_name(), outcome);
            }
            Err(e) => phase.record(format!("{}[{}]", config.source, index), Err(e)),
        }
    }
    Ok(())
}

fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_report(mode: Mode, phases: Vec<PhaseReport>) -> SyncReport {
        SyncReport {
            mode,
            source_kind: "mongo".into(),
            phases,
        }
    }

    #[test]
    fn test_status_line_success() {
        let mut phase = PhaseReport::new(BackendKind::Document);
        phase.record("a.json".into(), Ok(()));

        let report = make_report(Mode::Init, vec![phase]);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.status_lines(),
            vec!["> SUCCESS: Configs are initialized to: mongo"]
        );

        let report = SyncReport {
            mode: Mode::Pull,
            ..report
        };
        assert_eq!(
            report.status_lines(),
            vec!["> SUCCESS: Configs are loaded from: mongo"]
        );
    }

    #[test]
    fn test_item_failure_keeps_exit_code_zero() {
        let mut phase = PhaseReport::new(BackendKind::Document);
        phase.record("a.json".into(), Ok(()));
        phase.record(
            "b.json".into(),
            Err(SyncError::Remote("write rejected".into())),
        );

        let report = make_report(Mode::Init, vec![phase]);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failure_count(), 1);

        let lines = report.status_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "  - [MongoDB] b.json: Remote error: write rejected");
    }

    #[test]
    fn test_connect_failure_sets_exit_code() {
        let mut phase = PhaseReport::new(BackendKind::Graph);
        phase.fail(SyncError::Connection("refused".into()));

        assert!(phase.is_fatal());
        assert!(phase.failed_to_connect());
        let report = make_report(Mode::Pull, vec![phase]);
        assert_eq!(report.exit_code(), 1);

        let lines = report.status_lines();
        assert_eq!(lines[0], "> FAILED: Could not load configs from: mongo");
        assert_eq!(
            lines[1],
            "  - [ArangoDB] connect failed: Connection error: refused"
        );
    }

    #[test]
    fn test_listing_failure_is_reported_with_exit_code_zero() {
        let mut phase = PhaseReport::new(BackendKind::Spreadsheet);
        phase.advance(Stage::Listing);
        phase.fail(SyncError::SheetNotFound("prod".into()));

        assert!(phase.is_fatal());
        assert!(!phase.failed_to_connect());
        let report = make_report(Mode::Pull, vec![phase]);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failure_count(), 1);

        let lines = report.status_lines();
        assert_eq!(lines[0], "> FAILED: Could not load configs from: mongo");
        assert_eq!(
            lines[1],
            "  - [Google Sheets] listing failed: Sheet not found: prod"
        );
    }

    #[test]
    fn test_item_name() {
        assert_eq!(item_name(Path::new("/tmp/configs/a.json")), "a.json");
    }

    #[test]
    fn test_mode_default_is_pull() {
        assert_eq!(Mode::default(), Mode::Pull);
    }
}

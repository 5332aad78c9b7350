//! Conversion between configuration files on disk and [`Record`]s.
//!
//! The file extension selects the format: JSON files are parsed, YAML and
//! script files travel as raw text. On the way back to disk JSON is
//! pretty-printed and YAML is re-emitted in canonical form.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument};

use crate::error::SyncError;
use crate::record::{Format, Record, RecordValue};

/// Read a file and turn it into a record keyed by the file stem.
#[instrument(level = "debug")]
pub async fn decode(path: &Path) -> Result<Record, SyncError> {
    let key = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| SyncError::Io(format!("Invalid file name: {}", path.display())))?;

    let format = Format::from_extension(
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default(),
    );

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| SyncError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    let value = match format {
        Format::Json => {
            RecordValue::Json(serde_json::from_str(&text).map_err(|e| SyncError::MalformedJson {
                path: path.display().to_string(),
                message: e.to_string(),
            })?)
        }
        Format::Yaml => RecordValue::Yaml(text),
        Format::Script => RecordValue::Script(text),
    };

    debug!("Decoded {} as {:?}", path.display(), format);
    Ok(Record::new(key, value))
}

/// Serialize a record's value into the text written to disk.
pub fn render(record: &Record) -> Result<String, SyncError> {
    match &record.value {
        RecordValue::Json(value) => serde_json::to_string_pretty(value).map_err(|e| {
            SyncError::Io(format!("Failed to serialize {}: {}", record.key, e))
        }),
        RecordValue::Yaml(text) => canonical_yaml(&record.key, text),
        RecordValue::Script(text) => Ok(text.clone()),
    }
}

/// Re-parse YAML text and emit it again, normalizing layout and quoting.
pub fn canonical_yaml(key: &str, text: &str) -> Result<String, SyncError> {
    let parsed: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| SyncError::MalformedYaml {
            key: key.to_string(),
            message: e.to_string(),
        })?;

    serde_yaml::to_string(&parsed).map_err(|e| SyncError::MalformedYaml {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Check that a record key names a single file inside the sync directory.
pub fn validate_file_key(key: &str) -> Result<(), SyncError> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key == "." || key == ".." {
        Some("key is a relative directory name")
    } else if key.contains('/') || key.contains('\\') {
        Some("key contains a path separator")
    } else if key.contains('\0') {
        Some("key contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SyncError::InvalidInputShape {
            key: key.to_string(),
            message: format!("cannot be used as a file name: {}", reason),
        }),
        None => Ok(()),
    }
}

/// Write a record to `dir/<key><ext>`, overwriting any existing file.
///
/// Keys that would resolve outside `dir` are rejected before anything is
/// written.
#[instrument(skip(record), level = "debug", fields(key = %record.key))]
pub async fn encode(record: &Record, dir: &Path) -> Result<PathBuf, SyncError> {
    validate_file_key(&record.key)?;
    let content = render(record)?;
    let file_path = dir.join(record.file_name());

    fs::write(&file_path, content.as_bytes()).await.map_err(|e| {
        SyncError::Io(format!("Failed to write {}: {}", file_path.display(), e))
    })?;

    debug!("Wrote {} ({} bytes)", file_path.display(), content.len());
    Ok(file_path)
}

/// List the regular files directly inside `dir`, sorted by name.
pub async fn list_local(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::Io(format!("Failed to list {}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::Io(format!("Failed to list {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => debug!("Skipping non-file entry {}", path.display()),
            Err(e) => debug!("Skipping unreadable entry {}: {}", path.display(), e),
        }
    }

    files.sort();
    Ok(files)
}

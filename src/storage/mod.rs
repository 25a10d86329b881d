//! Cassette persistence
//!
//! A cassette file's existence decides the session mode. Writes replace the
//! whole document through a temporary file and a rename, so a reader never
//! sees a partial or concatenated document.

mod filter;
mod format;

pub use filter::ScopeFilter;
pub use format::{CassetteEntry, REDACTED};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ReelError, Result};

/// Loads and persists cassettes keyed by file path
pub struct CassetteStore;

impl CassetteStore {
    /// Whether a cassette file exists at `path`
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Load the ordered entries of a cassette
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Parse` if it is not a
    /// valid cassette document
    pub fn load(path: &Path) -> Result<Vec<CassetteEntry>> {
        let content = fs::read(path)?;

        let entries: Vec<CassetteEntry> =
            serde_json::from_slice(&content).map_err(|source| ReelError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        for (i, entry) in entries.iter().enumerate() {
            entry.to_response().map_err(|e| ReelError::Parse {
                path: path.display().to_string(),
                source: serde::de::Error::custom(format!("entry {i}: invalid binary body: {e}")),
            })?;
        }

        debug!("Loaded cassette {}: {} entries", path.display(), entries.len());

        Ok(entries)
    }

    /// Write `entries` as the complete cassette at `path`
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if the document cannot be written
    pub fn persist(path: &Path, entries: &[CassetteEntry]) -> Result<()> {
        let document = render(entries)?;

        write_atomic(path, document.as_bytes()).map_err(|source| ReelError::FileSystem {
            path: path.display().to_string(),
            source,
        })?;

        info!(
            "Persisted cassette {}: {} entries",
            path.display(),
            entries.len()
        );

        Ok(())
    }
}

/// Pretty-printed document with `\n` line endings and a trailing newline
///
/// Line endings do not vary by platform.
fn render(entries: &[CassetteEntry]) -> Result<String> {
    let mut document = serde_json::to_string_pretty(entries).map_err(|source| {
        ReelError::InvalidRequest(format!("Failed to serialize cassette: {source}"))
    })?;
    document.push('\n');
    Ok(document)
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "cassette".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

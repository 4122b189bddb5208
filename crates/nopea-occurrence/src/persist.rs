use crate::model::Occurrence;
use nopea_core::envelope;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ETF_MAGIC: &[u8; 4] = b"NOCC";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("creating .nopea directory: {0}")]
    CreateDir(#[source] io::Error),
    #[error("writing occurrence.json: {0}")]
    WriteJson(#[source] io::Error),
    #[error("encoding occurrence.json: {0}")]
    EncodeJson(#[source] serde_json::Error),
    #[error("writing occurrence etf: {0}")]
    WriteEtf(#[source] io::Error),
    #[error("encoding occurrence etf: {0}")]
    EncodeEtf(#[source] nopea_core::EnvelopeError),
}

fn nopea_dir(root: &Path) -> PathBuf {
    root.join(".nopea")
}

/// Writes both the cold JSON path and the warm binary path under
/// `root/.nopea`, creating the directory tree idempotently
/// (spec.md §4.9 "Persist").
pub fn persist(root: &Path, occurrence: &Occurrence) -> Result<(), PersistError> {
    let dir = nopea_dir(root);
    std::fs::create_dir_all(dir.join("occurrences")).map_err(PersistError::CreateDir)?;

    let json = serde_json::to_string_pretty(occurrence).map_err(PersistError::EncodeJson)?;
    std::fs::write(dir.join("occurrence.json"), json).map_err(PersistError::WriteJson)?;

    let etf_path = dir.join("occurrences").join(format!("{}.etf", occurrence.id));
    let bytes = envelope::wrap(ETF_MAGIC, occurrence).map_err(PersistError::EncodeEtf)?;
    std::fs::write(&etf_path, bytes).map_err(PersistError::WriteEtf)?;

    tracing::debug!(id = %occurrence.id, path = %etf_path.display(), "persisted occurrence artifact");
    Ok(())
}

/// Reads an `.etf` artifact back, verifying its integrity header.
pub fn read_etf(path: &Path) -> Result<Occurrence, PersistError> {
    let bytes = std::fs::read(path).map_err(PersistError::WriteEtf)?;
    envelope::unwrap(ETF_MAGIC, &bytes).map_err(PersistError::EncodeEtf)
}

//! Export download
//!
//! The server serializes the export; the payload is written out untouched.

use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;

use crate::admin::types::ExportFormat;

/// `credentials.json` / `credentials.csv`
pub fn export_file_name(format: ExportFormat) -> String {
    format!("credentials.{}", format.as_str())
}

/// Write `payload` to `<dir>/credentials.<format>`, replacing any existing file
pub async fn save_export(dir: &Path, format: ExportFormat, payload: &Bytes) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let path = dir.join(export_file_name(format));
    tokio::fs::write(&path, payload)
        .await
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;

    tracing::info!("Exported {} bytes to {}", payload.len(), path.display());
    Ok(path)
}

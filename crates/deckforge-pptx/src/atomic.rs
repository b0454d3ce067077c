//! Crash-safe file replacement.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{DeckError, Result};

/// Write `data` to `path` atomically
///
/// The bytes go to a temporary file in the target's directory, are synced,
/// then renamed over the target. On any failure the temporary file is
/// removed and an existing target is left untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| DeckError::output_write(path, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| DeckError::output_write(path, e))?;
    temp.write_all(data)
        .map_err(|e| DeckError::output_write(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| DeckError::output_write(path, e))?;
    temp.persist(path)
        .map_err(|e| DeckError::output_write(path, e.error))?;

    Ok(())
}

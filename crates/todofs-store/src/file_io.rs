//! Whole-file reads and line writes for task files.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use todofs_core::{FileSnapshot, LineEnding, TaskLine};

use crate::error::StoreError;

/// How [`write_lines`] opens the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate and replace the contents.
    Overwrite,
    /// Add to the end, creating the file if needed.
    Append,
}

/// Reads `path` into a snapshot.
pub fn read_snapshot(path: &Utf8Path) -> Result<FileSnapshot, StoreError> {
    let contents = read_to_string(path)?;
    Ok(FileSnapshot::parse(path.to_owned(), &contents))
}

/// Reads `path` as UTF-8 text.
pub fn read_to_string(path: &Utf8Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|e| StoreError::read(path, e))
}

/// Writes `lines`, each followed by `eol`, and syncs the file.
///
/// An empty slice writes no bytes, not a bare `eol`: in overwrite mode the
/// file ends up empty and reads back as zero lines.
pub fn write_lines(
    path: &Utf8Path,
    lines: &[TaskLine],
    eol: LineEnding,
    mode: WriteMode,
) -> Result<(), StoreError> {
    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Overwrite => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };

    let file = options.open(path).map_err(|e| StoreError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(eol.render(lines).as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| StoreError::write(path, e))?;
    writer
        .get_ref()
        .sync_data()
        .map_err(|e| StoreError::write(path, e))
}

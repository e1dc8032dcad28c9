//! Handles to user-selected files.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Reference to a file the user picked for scanning.
///
/// A handle only records where the file lives and how big it was when it was
/// selected; contents are read at submission time. Two handles refer to the
/// same file when their paths are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    /// File name as uploaded to the server.
    pub name: CompactString,
    /// Size in bytes at selection time.
    pub size: u64,
    /// Absolute or caller-relative location used to read the file.
    pub path: PathBuf,
    /// Location below the selected directory root, for directory selections.
    pub relative_path: Option<PathBuf>,
}

impl FileHandle {
    /// Create a handle from already-known parts.
    pub fn new(name: impl Into<CompactString>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            path: path.into(),
            relative_path: None,
        }
    }

    /// Create a handle by reading the file's metadata.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| ClientError::io(path, &e))?;
        if !metadata.is_file() {
            return Err(ClientError::Io {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }
        Ok(Self::new(file_name_of(path), metadata.len(), path))
    }

    /// Attach the path below a directory root.
    pub fn with_relative_path(mut self, relative: impl Into<PathBuf>) -> Self {
        self.relative_path = Some(relative.into());
        self
    }

    /// Human-readable size (e.g. "1.5 KiB").
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size, humansize::BINARY)
    }

    /// Name to show in lists: the relative path when known, else the name.
    pub fn display_name(&self) -> String {
        match &self.relative_path {
            Some(rel) => rel.display().to_string(),
            None => self.name.to_string(),
        }
    }
}

fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::from(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::from(path.to_string_lossy()))
}

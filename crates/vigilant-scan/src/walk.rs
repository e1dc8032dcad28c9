//! Directory selection: collect every regular file below a root.

use std::path::Path;

use compact_str::CompactString;
use jwalk::WalkDir;
use tracing::warn;

use vigilant_core::{ClientError, FileHandle};

/// Walk `root` recursively and return its name plus a handle per file.
///
/// Hidden files are included. Each handle's relative path starts with the
/// root name, e.g. `photos/2024/a.jpg`. Unreadable entries are logged and
/// skipped. Files are returned in sorted walk order.
pub fn collect_directory(root: &Path) -> Result<(CompactString, Vec<FileHandle>), ClientError> {
    let metadata = std::fs::metadata(root).map_err(|e| ClientError::io(root, &e))?;
    if !metadata.is_dir() {
        return Err(ClientError::Io {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let root_name: CompactString = root
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .map(|n| n.to_string_lossy().into())
        .unwrap_or_else(|| root.to_string_lossy().into());

    let walker = WalkDir::new(root).skip_hidden(false).sort(true);

    let mut files = Vec::new();
    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file without metadata");
                continue;
            }
        };

        let relative = match path.strip_prefix(root) {
            Ok(rel) => Path::new(root_name.as_str()).join(rel),
            Err(_) => path.clone(),
        };
        let name = entry.file_name().to_string_lossy().to_string();
        files.push(FileHandle::new(name, size, path).with_relative_path(relative));
    }

    Ok((root_name, files))
}

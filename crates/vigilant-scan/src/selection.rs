//! The user's current scan input.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use indexmap::IndexMap;
use strum::Display;
use tokio::sync::broadcast;

use vigilant_core::{ClientError, FileHandle};

use crate::SELECTION_CHANNEL_SIZE;
use crate::walk::collect_directory;

/// Which kind of selection is active. The two are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SelectionMode {
    #[default]
    Files,
    Directory,
}

/// Immutable copy of a selection, handed to a scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSet {
    Files {
        items: Vec<FileHandle>,
    },
    Directory {
        root: CompactString,
        items: Vec<FileHandle>,
    },
}

impl SelectionSet {
    pub fn items(&self) -> &[FileHandle] {
        match self {
            Self::Files { items } | Self::Directory { items, .. } => items,
        }
    }

    pub fn into_items(self) -> Vec<FileHandle> {
        match self {
            Self::Files { items } | Self::Directory { items, .. } => items,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        match self {
            Self::Files { .. } => SelectionMode::Files,
            Self::Directory { .. } => SelectionMode::Directory,
        }
    }

    /// Directory name, for directory selections.
    pub fn root(&self) -> Option<&str> {
        match self {
            Self::Files { .. } => None,
            Self::Directory { root, .. } => Some(root.as_str()),
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Total bytes across all selected files.
    pub fn total_size(&self) -> u64 {
        self.items().iter().map(|f| f.size).sum()
    }
}

/// Change notification for the view layer; every mutation emits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The queue changed and should be re-rendered.
    Updated { mode: SelectionMode, count: usize },
    /// The selection was emptied and the file-input control should reset.
    Cleared,
}

/// Holds the files the next scan will submit.
///
/// Files are unique by path and keep insertion order. While a scan is
/// running the store is locked: replacing or removing entries is rejected
/// without any state change. Clearing is always allowed.
#[derive(Debug)]
pub struct SelectionStore {
    mode: SelectionMode,
    root: Option<CompactString>,
    items: IndexMap<PathBuf, FileHandle>,
    locked: bool,
    events: broadcast::Sender<SelectionEvent>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    /// Create an empty store in files mode.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SELECTION_CHANNEL_SIZE);
        Self {
            mode: SelectionMode::Files,
            root: None,
            items: IndexMap::new(),
            locked: false,
            events,
        }
    }

    /// Subscribe to selection changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.events.subscribe()
    }

    /// Replace the selection with individual files, leaving directory mode.
    ///
    /// Returns false, changing nothing, while a scan is running.
    pub fn set_files(&mut self, files: impl IntoIterator<Item = FileHandle>) -> bool {
        if self.locked {
            tracing::debug!("selection locked, ignoring file selection");
            return false;
        }
        self.mode = SelectionMode::Files;
        self.root = None;
        self.replace_items(files);
        self.emit_updated();
        true
    }

    /// Replace the selection with a directory's files, leaving files mode.
    ///
    /// Returns false, changing nothing, while a scan is running.
    pub fn set_directory(
        &mut self,
        root: impl Into<CompactString>,
        files: impl IntoIterator<Item = FileHandle>,
    ) -> bool {
        if self.locked {
            tracing::debug!("selection locked, ignoring directory selection");
            return false;
        }
        self.mode = SelectionMode::Directory;
        self.root = Some(root.into());
        self.replace_items(files);
        self.emit_updated();
        true
    }

    /// Walk `path` and select every regular file below it.
    ///
    /// Returns `Ok(false)` when the store is locked; the directory is not
    /// walked in that case.
    pub fn set_directory_from_path(&mut self, path: impl AsRef<Path>) -> Result<bool, ClientError> {
        if self.locked {
            return Ok(false);
        }
        let (root, files) = collect_directory(path.as_ref())?;
        Ok(self.set_directory(root, files))
    }

    /// Remove the file at `index` in files mode.
    ///
    /// Out-of-range indices, directory mode and a locked store are silent
    /// no-ops returning `None`.
    pub fn remove_file(&mut self, index: usize) -> Option<FileHandle> {
        if self.locked || self.mode != SelectionMode::Files {
            return None;
        }
        let (_, removed) = self.items.shift_remove_index(index)?;
        self.emit_updated();
        Some(removed)
    }

    /// Empty the selection and reset the input control.
    pub fn clear(&mut self) {
        self.items.clear();
        self.mode = SelectionMode::Files;
        self.root = None;
        let _ = self.events.send(SelectionEvent::Cleared);
    }

    /// Copy of the current selection.
    pub fn snapshot(&self) -> SelectionSet {
        let items = self.items.values().cloned().collect();
        match (&self.mode, &self.root) {
            (SelectionMode::Directory, Some(root)) => SelectionSet::Directory {
                root: root.clone(),
                items,
            },
            _ => SelectionSet::Files { items },
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Selected files in order.
    pub fn files(&self) -> impl Iterator<Item = &FileHandle> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// An empty selection cannot start a scan.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a scan currently owns the selection.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn replace_items(&mut self, files: impl IntoIterator<Item = FileHandle>) {
        self.items = files
            .into_iter()
            .map(|file| (file.path.clone(), file))
            .collect();
    }

    fn emit_updated(&self) {
        let _ = self.events.send(SelectionEvent::Updated {
            mode: self.mode,
            count: self.items.len(),
        });
    }
}

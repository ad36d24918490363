//! Event handler trait and the event payloads it receives

use std::path::{Path, PathBuf};

use crate::handle::WatcherHandle;

/// What happened to a watched entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Changed,
    Created,
    Deleted,
    Renamed,
}

/// Payload for changed, created and deleted events
#[derive(Debug, Clone)]
pub struct FileSystemEvent {
    pub kind: ChangeKind,
    pub full_path: PathBuf,
    /// File name of `full_path`
    pub name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl FileSystemEvent {
    pub fn new(kind: ChangeKind, full_path: PathBuf) -> Self {
        Self {
            kind,
            name: file_name_of(&full_path),
            full_path,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Payload for rename events
#[derive(Debug, Clone)]
pub struct RenamedEvent {
    pub full_path: PathBuf,
    pub name: String,
    pub old_full_path: PathBuf,
    pub old_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RenamedEvent {
    pub fn new(old_full_path: PathBuf, full_path: PathBuf) -> Self {
        Self {
            name: file_name_of(&full_path),
            old_name: file_name_of(&old_full_path),
            full_path,
            old_full_path,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Payload for errors raised by the underlying watch, such as a buffer overflow
#[derive(Debug, Clone)]
pub struct WatchErrorEvent {
    pub message: String,
    pub path: Option<PathBuf>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl WatchErrorEvent {
    pub fn new(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            message: message.into(),
            path,
            timestamp: chrono::Utc::now(),
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Trait for consumers of forwarded watch events
///
/// Every callback receives the handle that forwarded the event as `source`.
/// Callbacks run on the watch backend's thread and should return quickly.
///
/// A handler that stores a clone of `source` forms a cycle with the handle's
/// handler slot, so dropping the caller's clones no longer disposes it. Call
/// [`WatcherHandle::dispose`](crate::WatcherHandle::dispose) explicitly in
/// that case; it empties the slot and breaks the cycle.
#[cfg_attr(test, mockall::automock)]
pub trait WatchEventHandler: Send + Sync {
    fn on_changed(&self, source: &WatcherHandle, event: &FileSystemEvent);

    fn on_created(&self, source: &WatcherHandle, event: &FileSystemEvent);

    fn on_deleted(&self, source: &WatcherHandle, event: &FileSystemEvent);

    fn on_error(&self, source: &WatcherHandle, event: &WatchErrorEvent);

    fn on_renamed(&self, source: &WatcherHandle, event: &RenamedEvent);
}

//! Watch source trait for the OS-level change-notification collaborator

use std::path::PathBuf;
use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

use super::event_handler::{FileSystemEvent, RenamedEvent, WatchErrorEvent};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Invalid path for `{param}`: {path:?}")]
    InvalidPath { path: String, param: &'static str },
    #[error("Watch error: {0}")]
    Watch(String),
}

bitflags! {
    /// Change attributes that make the source raise an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyTriggers: u8 {
        const FILE_NAME = 1 << 0;
        const DIRECTORY_NAME = 1 << 1;
        const ATTRIBUTES = 1 << 2;
        const LAST_WRITE = 1 << 3;
        const LAST_ACCESS = 1 << 4;
    }
}

/// Everything a source needs to know to watch one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    /// Directory handed to the OS watch
    pub directory: PathBuf,
    /// Exact file name to report on, or `None` for every entry
    pub filter: Option<String>,
    pub triggers: NotifyTriggers,
    pub recursive: bool,
}

impl WatchSpec {
    /// Whether `name` passes the file-name filter
    pub fn matches(&self, name: &str) -> bool {
        self.filter.as_deref().map_or(true, |filter| filter == name)
    }
}

/// An event as raised by the source, before it is relayed to a handler
#[derive(Debug, Clone)]
pub enum RawEvent {
    Changed(FileSystemEvent),
    Created(FileSystemEvent),
    Deleted(FileSystemEvent),
    Renamed(RenamedEvent),
    Error(WatchErrorEvent),
}

/// Callback a source pushes raw events into
pub type EventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// Trait for the underlying change-notification mechanism
///
/// Production: `notify` crate (inotify, FSEvents, ReadDirectoryChangesW, polling)
/// Testing: Manual event emission
#[cfg_attr(test, mockall::automock)]
pub trait WatchSource: Send + Sync {
    /// Start delivering events for `spec` into `sink`, replacing any previous subscription
    fn subscribe(&self, spec: &WatchSpec, sink: EventSink) -> Result<(), WatcherError>;

    /// Stop delivering events and release the OS watch
    fn unsubscribe(&self) -> Result<(), WatcherError>;

    fn is_subscribed(&self) -> bool;
}

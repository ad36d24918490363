//! Trait definitions for dependency injection
//!
//! The OS watch mechanism and the event consumer are both abstracted behind
//! traits so the handle can be tested without touching the file system.

mod event_handler;
mod watch_source;

pub(crate) use event_handler::file_name_of;
pub use event_handler::{
    ChangeKind, FileSystemEvent, RenamedEvent, WatchErrorEvent, WatchEventHandler,
};
pub use watch_source::{EventSink, NotifyTriggers, RawEvent, WatchSource, WatchSpec, WatcherError};

#[cfg(test)]
pub use event_handler::MockWatchEventHandler;
#[cfg(test)]
pub use watch_source::MockWatchSource;

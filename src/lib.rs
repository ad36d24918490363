//! Pathwatch - watch a single file or directory and forward its change events
//!
//! A [`WatcherHandle`] classifies its target as a file or a directory, exposes
//! derived metadata and relays events from an OS watch to one replaceable
//! [`WatchEventHandler`]. The OS mechanism sits behind the [`WatchSource`]
//! trait so handles can be driven by hand in tests.

pub mod traits;
pub mod mocks;
pub mod production;

pub mod config;
pub mod factory;
pub mod handle;
pub mod logging;

pub use config::{Backend, ConfigError, WatcherConfig};
pub use factory::WatcherFactory;
pub use handle::{TargetKind, WatchTarget, WatcherHandle, DIRECTORY_MIME_TYPE};
pub use logging::init_logging;
pub use traits::{
    ChangeKind, FileSystemEvent, RenamedEvent, WatchErrorEvent, WatchEventHandler, WatchSource,
    WatcherError,
};

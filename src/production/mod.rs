//! Production implementations of traits

mod notify_source;

pub use notify_source::NotifyWatchSource;

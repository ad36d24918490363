//! Watcher handle: one watched file or directory plus a replaceable handler
//!
//! The handle owns a single subscription on a [`WatchSource`]. Start, stop and
//! handler reassignment are serialized through one lock per handle; events are
//! relayed on the source's own thread straight into the bound handler.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::WatcherConfig;
use crate::production::NotifyWatchSource;
use crate::traits::{
    file_name_of, EventSink, NotifyTriggers, RawEvent, WatchEventHandler, WatchSource, WatchSpec,
    WatcherError,
};

/// Content type reported for directory targets
pub const DIRECTORY_MIME_TYPE: &str = "inode/directory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

impl TargetKind {
    /// `None` when the path is neither an existing file nor an existing directory
    pub fn classify(path: &Path) -> Option<Self> {
        if path.is_file() {
            Some(TargetKind::File)
        } else if path.is_dir() {
            Some(TargetKind::Directory)
        } else {
            None
        }
    }
}

/// The single file or directory a handle observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl WatchTarget {
    /// Trim, make absolute and classify `path`
    pub fn resolve(path: &str) -> Result<Self, WatcherError> {
        let invalid = || WatcherError::InvalidPath {
            path: path.to_string(),
            param: "path",
        };

        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let absolute = std::path::absolute(trimmed).map_err(|_| invalid())?;
        let kind = TargetKind::classify(&absolute).ok_or_else(invalid)?;

        Ok(Self {
            path: absolute,
            kind,
        })
    }

    fn watch_spec(&self, config: &WatcherConfig) -> WatchSpec {
        match self.kind {
            TargetKind::File => WatchSpec {
                directory: self
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
                filter: Some(file_name_of(&self.path)),
                triggers: NotifyTriggers::LAST_WRITE | NotifyTriggers::FILE_NAME,
                recursive: false,
            },
            TargetKind::Directory => WatchSpec {
                directory: self.path.clone(),
                filter: None,
                triggers: NotifyTriggers::LAST_WRITE | NotifyTriggers::DIRECTORY_NAME,
                recursive: config.include_subdirectories,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Idle,
    Watching,
}

type DisposedObserver = Box<dyn FnOnce() + Send>;

struct HandleInner {
    target: WatchTarget,
    spec: WatchSpec,
    source: Arc<dyn WatchSource>,
    state: Mutex<WatchState>,
    // Kept apart from `state` so the relay never waits on a start/stop in progress
    handler: RwLock<Option<Arc<dyn WatchEventHandler>>>,
    /// Bumped on every start and stop; relays from older subscriptions go quiet
    generation: AtomicU64,
    disposed: AtomicBool,
    observers: Mutex<Vec<DisposedObserver>>,
}

impl HandleInner {
    fn stop_locked(&self, state: &mut WatchState) -> Result<(), WatcherError> {
        if *state == WatchState::Idle {
            return Ok(());
        }
        self.source.unsubscribe()?;
        self.mark_idle(state);
        tracing::info!(path = %self.target.path.display(), "Stopped watching");
        Ok(())
    }

    fn mark_idle(&self, state: &mut WatchState) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = WatchState::Idle;
    }

    fn dispose(&self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        {
            let mut state = self.state.lock();
            if let Err(e) = self.stop_locked(&mut state) {
                tracing::warn!(path = %self.target.path.display(), error = %e, "Failed to release watch on dispose");
                self.mark_idle(&mut state);
            }
        }
        *self.handler.write() = None;

        let observers = std::mem::take(&mut *self.observers.lock());
        for observer in observers {
            observer();
        }
        tracing::debug!(path = %self.target.path.display(), "Watcher handle disposed");
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Handle on one watched file or directory
///
/// Clones share the same subscription. The handle is disposed by
/// [`WatcherHandle::dispose`] or when the last clone is dropped.
#[derive(Clone)]
pub struct WatcherHandle {
    inner: Arc<HandleInner>,
}

impl WatcherHandle {
    /// Watch `path` with the native `notify` backend and default config
    pub fn new(
        path: &str,
        handler: Option<Arc<dyn WatchEventHandler>>,
    ) -> Result<Self, WatcherError> {
        let config = WatcherConfig::default();
        let source = Arc::new(NotifyWatchSource::new(config.clone()));
        Self::with_source(path, handler, source, &config)
    }

    /// Watch `path` through a caller-supplied source
    pub fn with_source(
        path: &str,
        handler: Option<Arc<dyn WatchEventHandler>>,
        source: Arc<dyn WatchSource>,
        config: &WatcherConfig,
    ) -> Result<Self, WatcherError> {
        let target = WatchTarget::resolve(path)?;
        let spec = target.watch_spec(config);
        tracing::debug!(path = %target.path.display(), kind = ?target.kind, "Created watcher handle");

        Ok(Self {
            inner: Arc::new(HandleInner {
                target,
                spec,
                source,
                state: Mutex::new(WatchState::Idle),
                handler: RwLock::new(handler),
                generation: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn target(&self) -> &WatchTarget {
        &self.inner.target
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.target.kind
    }

    /// Configuration handed to the watch source
    pub fn watch_spec(&self) -> &WatchSpec {
        &self.inner.spec
    }

    /// Base name of the watched file or directory
    pub fn name(&self) -> String {
        file_name_of(&self.inner.target.path)
    }

    pub fn full_path(&self) -> PathBuf {
        let spec = &self.inner.spec;
        match &spec.filter {
            Some(filter) => spec.directory.join(filter),
            None => spec.directory.clone(),
        }
    }

    /// File extension for files, [`DIRECTORY_MIME_TYPE`] for directories
    pub fn mime_type(&self) -> String {
        match self.inner.target.kind {
            TargetKind::File => self
                .inner
                .target
                .path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
            TargetKind::Directory => DIRECTORY_MIME_TYPE.to_string(),
        }
    }

    pub fn is_watching(&self) -> bool {
        *self.inner.state.lock() == WatchState::Watching
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Subscribe to the source and start forwarding events. No-op if already watching.
    pub fn start_watching(&self) -> Result<(), WatcherError> {
        let mut state = self.inner.state.lock();
        if self.is_disposed() {
            return Ok(());
        }
        self.start_locked(&mut state)
    }

    /// Stop forwarding events and release the subscription. No-op if idle.
    pub fn stop_watching(&self) -> Result<(), WatcherError> {
        let mut state = self.inner.state.lock();
        self.inner.stop_locked(&mut state)
    }

    pub fn handler(&self) -> Option<Arc<dyn WatchEventHandler>> {
        self.inner.handler.read().clone()
    }

    /// Replace the bound handler
    ///
    /// While watching, the subscription is stopped, the handler swapped and the
    /// subscription restarted, all under the state lock.
    pub fn set_handler(
        &self,
        handler: Option<Arc<dyn WatchEventHandler>>,
    ) -> Result<(), WatcherError> {
        let mut state = self.inner.state.lock();
        if self.is_disposed() {
            return Ok(());
        }

        let was_watching = *state == WatchState::Watching;
        if was_watching {
            self.inner.stop_locked(&mut state)?;
        }
        *self.inner.handler.write() = handler;
        if was_watching {
            self.start_locked(&mut state)?;
        }
        tracing::debug!(path = %self.inner.target.path.display(), was_watching, "Handler replaced");
        Ok(())
    }

    /// Stop watching, drop the handler and notify disposal observers. Runs once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Register a callback for disposal; runs immediately if already disposed
    pub fn on_disposed<F>(&self, observer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut observers = self.inner.observers.lock();
        if !self.is_disposed() {
            observers.push(Box::new(observer));
            return;
        }
        drop(observers);
        observer();
    }

    /// Whether `other` is a clone of this handle
    pub fn same_handle(&self, other: &WatcherHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn start_locked(&self, state: &mut WatchState) -> Result<(), WatcherError> {
        if *state == WatchState::Watching {
            return Ok(());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let relay = Relay {
            handle: Arc::downgrade(&self.inner),
            generation,
        };
        let sink: EventSink = Arc::new(move |raw| relay.forward(raw));
        self.inner.source.subscribe(&self.inner.spec, sink)?;

        *state = WatchState::Watching;
        tracing::info!(
            path = %self.inner.target.path.display(),
            kind = ?self.inner.target.kind,
            "Started watching"
        );
        Ok(())
    }
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("target", &self.inner.target)
            .field("generation", &self.inner.generation.load(Ordering::Relaxed))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Pass-through adapter between the source's sink and the bound handler
struct Relay {
    handle: Weak<HandleInner>,
    generation: u64,
}

impl Relay {
    fn forward(&self, raw: RawEvent) {
        let Some(inner) = self.handle.upgrade() else {
            return;
        };
        let handler = inner.handler.read().clone();
        // Checked after reading the slot: a swap bumps the generation before
        // replacing the handler, so a stale relay never reaches the new one
        if inner.generation.load(Ordering::Acquire) != self.generation {
            tracing::trace!(?raw, "Dropping event from a stale subscription");
            return;
        }
        let Some(handler) = handler else {
            tracing::trace!(?raw, "No handler bound, dropping event");
            return;
        };

        let source = WatcherHandle { inner };
        tracing::debug!(?raw, "Forwarding event");
        match raw {
            RawEvent::Changed(event) => handler.on_changed(&source, &event),
            RawEvent::Created(event) => handler.on_created(&source, &event),
            RawEvent::Deleted(event) => handler.on_deleted(&source, &event),
            RawEvent::Error(event) => handler.on_error(&source, &event),
            RawEvent::Renamed(event) => handler.on_renamed(&source, &event),
        }
    }
}

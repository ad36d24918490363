//! Test doubles for dependency injection
//!
//! Provides an in-memory watch source and a recording handler for isolated testing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handle::WatcherHandle;
use crate::traits::{
    ChangeKind, EventSink, FileSystemEvent, RawEvent, RenamedEvent, WatchErrorEvent,
    WatchEventHandler, WatchSource, WatchSpec, WatcherError,
};

// ============================================================================
// ManualWatchSource
// ============================================================================

/// Manual watch source for testing
///
/// Does not touch the file system. Tests call `simulate_*` to push events into
/// whatever sink is currently subscribed.
#[derive(Clone, Default)]
pub struct ManualWatchSource {
    sink: Arc<Mutex<Option<EventSink>>>,
    spec: Arc<Mutex<Option<WatchSpec>>>,
    subscribes: Arc<AtomicUsize>,
    unsubscribes: Arc<AtomicUsize>,
}

impl ManualWatchSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec passed to the most recent `subscribe`
    pub fn last_spec(&self) -> Option<WatchSpec> {
        self.spec.lock().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// Push a raw event; returns false when nothing is subscribed
    pub fn simulate(&self, raw: RawEvent) -> bool {
        // Clone out so the sink runs without holding the lock
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink(raw);
                true
            }
            None => false,
        }
    }

    pub fn simulate_changed(&self, path: PathBuf) -> bool {
        self.simulate(RawEvent::Changed(FileSystemEvent::new(ChangeKind::Changed, path)))
    }

    pub fn simulate_created(&self, path: PathBuf) -> bool {
        self.simulate(RawEvent::Created(FileSystemEvent::new(ChangeKind::Created, path)))
    }

    pub fn simulate_deleted(&self, path: PathBuf) -> bool {
        self.simulate(RawEvent::Deleted(FileSystemEvent::new(ChangeKind::Deleted, path)))
    }

    pub fn simulate_renamed(&self, from: PathBuf, to: PathBuf) -> bool {
        self.simulate(RawEvent::Renamed(RenamedEvent::new(from, to)))
    }

    pub fn simulate_error(&self, message: &str) -> bool {
        self.simulate(RawEvent::Error(WatchErrorEvent::new(message, None)))
    }
}

impl WatchSource for ManualWatchSource {
    fn subscribe(&self, spec: &WatchSpec, sink: EventSink) -> Result<(), WatcherError> {
        *self.spec.lock() = Some(spec.clone());
        *self.sink.lock() = Some(sink);
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), WatcherError> {
        *self.sink.lock() = None;
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

// ============================================================================
// RecordingHandler
// ============================================================================

#[derive(Debug, Clone)]
pub enum RecordedEvent {
    Changed(FileSystemEvent),
    Created(FileSystemEvent),
    Deleted(FileSystemEvent),
    Error(WatchErrorEvent),
    Renamed(RenamedEvent),
}

/// Handler that records every forwarded event along with its source handle
///
/// Holding source handles keeps them alive until the recorder is dropped or
/// unbound.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<(WatcherHandle, RecordedEvent)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn sources(&self) -> Vec<WatcherHandle> {
        self.events.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(&self, source: &WatcherHandle, event: RecordedEvent) {
        self.events.lock().push((source.clone(), event));
    }
}

impl WatchEventHandler for RecordingHandler {
    fn on_changed(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        self.record(source, RecordedEvent::Changed(event.clone()));
    }

    fn on_created(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        self.record(source, RecordedEvent::Created(event.clone()));
    }

    fn on_deleted(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        self.record(source, RecordedEvent::Deleted(event.clone()));
    }

    fn on_error(&self, source: &WatcherHandle, event: &WatchErrorEvent) {
        self.record(source, RecordedEvent::Error(event.clone()));
    }

    fn on_renamed(&self, source: &WatcherHandle, event: &RenamedEvent) {
        self.record(source, RecordedEvent::Renamed(event.clone()));
    }
}

// ============================================================================
// Tests
// ============================================================================

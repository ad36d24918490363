//! End-to-end tests against the real notify backend.
//!
//! Tests the full flow: Factory → Handle → OS event → Handler

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use pathwatch::{
    Backend, ChangeKind, FileSystemEvent, RenamedEvent, TargetKind, WatchErrorEvent,
    WatchEventHandler, WatcherConfig, WatcherFactory, WatcherHandle,
};

#[derive(Debug)]
enum Seen {
    Changed(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed(PathBuf, PathBuf),
    Error(String),
}

/// Handler that pushes events into a channel and checks the source handle
struct ChannelHandler {
    tx: Mutex<Sender<Seen>>,
    expected_source: Mutex<Option<WatcherHandle>>,
}

impl ChannelHandler {
    fn new() -> (Arc<Self>, Receiver<Seen>) {
        let (tx, rx) = mpsc::channel();
        let handler = Arc::new(Self {
            tx: Mutex::new(tx),
            expected_source: Mutex::new(None),
        });
        (handler, rx)
    }

    fn expect_source(&self, handle: &WatcherHandle) {
        *self.expected_source.lock().unwrap() = Some(handle.clone());
    }

    fn send(&self, source: &WatcherHandle, seen: Seen) {
        if let Some(expected) = self.expected_source.lock().unwrap().as_ref() {
            assert!(expected.same_handle(source), "Event forwarded with a foreign source");
        }
        let _ = self.tx.lock().unwrap().send(seen);
    }
}

impl WatchEventHandler for ChannelHandler {
    fn on_changed(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        assert_eq!(event.kind, ChangeKind::Changed);
        self.send(source, Seen::Changed(event.full_path.clone()));
    }

    fn on_created(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        self.send(source, Seen::Created(event.full_path.clone()));
    }

    fn on_deleted(&self, source: &WatcherHandle, event: &FileSystemEvent) {
        self.send(source, Seen::Deleted(event.full_path.clone()));
    }

    fn on_error(&self, source: &WatcherHandle, event: &WatchErrorEvent) {
        self.send(source, Seen::Error(event.message.clone()));
    }

    fn on_renamed(&self, source: &WatcherHandle, event: &RenamedEvent) {
        self.send(
            source,
            Seen::Renamed(event.old_full_path.clone(), event.full_path.clone()),
        );
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Wait until `pred` matches an event or the deadline passes
fn wait_for<F>(rx: &Receiver<Seen>, timeout: Duration, mut pred: F) -> bool
where
    F: FnMut(&Seen) -> bool,
{
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(seen) if pred(&seen) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

#[test]
fn test_file_change_reaches_handler() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("watched.txt");
    std::fs::write(&file, "initial").unwrap();

    let (handler, rx) = ChannelHandler::new();
    let factory = WatcherFactory::default();
    let handle = factory
        .create_instance(file.to_str().unwrap(), Some(handler.clone()))
        .unwrap();
    handler.expect_source(&handle);

    assert_eq!(handle.kind(), TargetKind::File);
    assert_eq!(handle.full_path(), file);
    assert_eq!(handle.mime_type(), "txt");

    handle.start_watching().unwrap();
    assert!(handle.is_watching());

    std::fs::write(&file, "modified contents").unwrap();

    let received = wait_for(&rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Changed(path) if same_file(path, &file))
    });
    assert!(received, "Expected a changed event for {:?}", file);

    handle.dispose();
}

#[test]
fn test_sibling_changes_are_filtered_for_file_targets() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("watched.txt");
    let sibling = dir.path().join("sibling.txt");
    std::fs::write(&file, "initial").unwrap();
    std::fs::write(&sibling, "initial").unwrap();

    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(file.to_str().unwrap(), Some(handler))
        .unwrap();
    handle.start_watching().unwrap();

    std::fs::write(&sibling, "changed").unwrap();

    let leaked = wait_for(&rx, Duration::from_millis(500), |seen| {
        matches!(seen, Seen::Changed(path) if same_file(path, &sibling))
    });
    assert!(!leaked, "Sibling change should not be forwarded");
    handle.dispose();
}

#[test]
fn test_no_events_after_stop() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("stopped.txt");
    std::fs::write(&file, "initial").unwrap();

    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(file.to_str().unwrap(), Some(handler))
        .unwrap();

    handle.start_watching().unwrap();
    handle.stop_watching().unwrap();
    assert!(!handle.is_watching());

    // Drain anything raised before the stop took effect
    while rx.try_recv().is_ok() {}

    std::fs::write(&file, "after stop").unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    handle.dispose();
}

#[test]
fn test_reassigned_handler_receives_later_events() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("reassigned.txt");
    std::fs::write(&file, "initial").unwrap();

    let (first, first_rx) = ChannelHandler::new();
    let (second, second_rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(file.to_str().unwrap(), Some(first))
        .unwrap();
    handle.start_watching().unwrap();

    handle.set_handler(Some(second)).unwrap();
    assert!(handle.is_watching());
    while first_rx.try_recv().is_ok() {}

    std::fs::write(&file, "for the second handler").unwrap();

    let received = wait_for(&second_rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Changed(_))
    });
    assert!(received, "Second handler should receive the change");
    assert!(first_rx.recv_timeout(Duration::from_millis(200)).is_err());
    handle.dispose();
}

#[test]
fn test_directory_sees_file_changes() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("inside.log");
    std::fs::write(&file, "initial").unwrap();

    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(dir.path().to_str().unwrap(), Some(handler))
        .unwrap();
    assert_eq!(handle.kind(), TargetKind::Directory);
    assert_eq!(handle.full_path(), dir.path());
    handle.start_watching().unwrap();

    std::fs::write(&file, "appended").unwrap();

    let received = wait_for(&rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Changed(path) if same_file(path, &file))
    });
    assert!(received, "Expected a changed event inside the directory");
    handle.dispose();
}

#[test]
fn test_poll_backend_detects_changes() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("polled.txt");
    std::fs::write(&file, "initial").unwrap();

    let config = WatcherConfig {
        backend: Backend::Poll,
        poll_interval_ms: 100,
        ..WatcherConfig::default()
    };
    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::new(config)
        .create_instance(file.to_str().unwrap(), Some(handler))
        .unwrap();
    handle.start_watching().unwrap();

    // Let the first scan record the baseline before writing
    std::thread::sleep(Duration::from_millis(300));
    std::fs::write(&file, "a longer body so the size changes too").unwrap();

    let received = wait_for(&rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Changed(path) if same_file(path, &file))
    });
    assert!(received, "Poll backend should report the change");
    handle.dispose();
}

/// `watched/target.txt` plus a sibling directory on the same file system
fn move_fixture() -> (TempDir, PathBuf, PathBuf) {
    let root = TempDir::new().unwrap();
    let watched = root.path().join("watched");
    let elsewhere = root.path().join("elsewhere");
    std::fs::create_dir(&watched).unwrap();
    std::fs::create_dir(&elsewhere).unwrap();
    let target = watched.join("target.txt");
    std::fs::write(&target, "initial").unwrap();
    (root, target, elsewhere)
}

#[test]
fn test_moving_file_out_reports_deleted() {
    let (_root, target, elsewhere) = move_fixture();

    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(target.to_str().unwrap(), Some(handler))
        .unwrap();
    handle.start_watching().unwrap();

    std::fs::rename(&target, elsewhere.join("moved.txt")).unwrap();
    // The unpaired half is reported once the next event arrives
    std::fs::write(target.with_file_name("sibling.txt"), "nudge").unwrap();

    let received = wait_for(&rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Deleted(path) if path == &target)
    });
    assert!(received, "Expected a deleted event after moving the file out");
    handle.dispose();
}

#[test]
fn test_moving_file_in_reports_created() {
    let (_root, target, elsewhere) = move_fixture();
    let staged = elsewhere.join("staged.txt");
    std::fs::write(&staged, "replacement").unwrap();

    let (handler, rx) = ChannelHandler::new();
    let handle = WatcherFactory::default()
        .create_instance(target.to_str().unwrap(), Some(handler))
        .unwrap();
    handle.start_watching().unwrap();

    std::fs::rename(&staged, &target).unwrap();

    let received = wait_for(&rx, Duration::from_secs(5), |seen| {
        matches!(seen, Seen::Created(path) if same_file(path, &target))
    });
    assert!(received, "Expected a created event after moving a file in");
    handle.dispose();
}

#[test]
fn test_invalid_paths_are_rejected() {
    let factory = WatcherFactory::default();

    for path in ["", "   ", "/definitely/not/here", "*.rs", "bad\0path"] {
        assert!(
            matches!(
                factory.create_instance(path, None),
                Err(pathwatch::WatcherError::InvalidPath { param: "path", .. })
            ),
            "Expected {:?} to be rejected",
            path
        );
    }
}

#[tokio::test]
async fn test_async_factory_builds_usable_handle() {
    let dir = TempDir::new().unwrap();

    let handle = WatcherFactory::default()
        .create_instance_async(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(handle.kind(), TargetKind::Directory);
    handle.start_watching().unwrap();
    assert!(handle.is_watching());
    handle.dispose();
    assert!(!handle.is_watching());
}

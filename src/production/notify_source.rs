//! `notify`-backed watch source

use std::path::PathBuf;

use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::config::{Backend, WatcherConfig};
use crate::traits::{
    file_name_of, ChangeKind, EventSink, FileSystemEvent, NotifyTriggers, RawEvent, RenamedEvent,
    WatchErrorEvent, WatchSource, WatchSpec, WatcherError,
};

pub struct NotifyWatchSource {
    config: WatcherConfig,
    watcher: Mutex<Option<Box<dyn Watcher + Send>>>,
}

impl NotifyWatchSource {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            watcher: Mutex::new(None),
        }
    }
}

impl Default for NotifyWatchSource {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

impl WatchSource for NotifyWatchSource {
    fn subscribe(&self, spec: &WatchSpec, sink: EventSink) -> Result<(), WatcherError> {
        let mut slot = self.watcher.lock();
        // Release the previous OS watch before registering a new one
        drop(slot.take());

        let mut translator = EventTranslator::new(spec.clone());
        let handler = move |result: notify::Result<notify::Event>| {
            for raw in translator.translate(result) {
                sink(raw);
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.config.backend {
            Backend::Recommended => Box::new(
                notify::recommended_watcher(handler)
                    .map_err(|e| WatcherError::Watch(e.to_string()))?,
            ),
            Backend::Poll => Box::new(
                PollWatcher::new(
                    handler,
                    notify::Config::default().with_poll_interval(self.config.poll_interval()),
                )
                .map_err(|e| WatcherError::Watch(e.to_string()))?,
            ),
        };

        let mode = if spec.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&spec.directory, mode)
            .map_err(|e| WatcherError::Watch(e.to_string()))?;

        tracing::info!(
            directory = %spec.directory.display(),
            filter = ?spec.filter,
            backend = ?self.config.backend,
            "Subscribed to OS watch"
        );
        *slot = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), WatcherError> {
        // Dropping the watcher tears down its backend thread without waiting on it
        if self.watcher.lock().take().is_some() {
            tracing::info!("Unsubscribed from OS watch");
        }
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

/// Maps `notify` events onto the five raw event kinds, applying the trigger mask and filter
pub(crate) struct EventTranslator {
    spec: WatchSpec,
    /// `Name(From)` waiting for the other half of the move
    pending_from: Option<PendingFrom>,
}

struct PendingFrom {
    /// inotify cookie; `None` on backends that pair halves by order (Windows)
    tracker: Option<usize>,
    path: PathBuf,
}

impl EventTranslator {
    pub(crate) fn new(spec: WatchSpec) -> Self {
        Self {
            spec,
            pending_from: None,
        }
    }

    pub(crate) fn translate(&mut self, result: notify::Result<notify::Event>) -> Vec<RawEvent> {
        match result {
            Ok(event) => self.translate_event(event),
            Err(err) => {
                tracing::warn!(error = %err, "OS watch reported an error");
                vec![RawEvent::Error(WatchErrorEvent::new(
                    err.to_string(),
                    err.paths.first().cloned(),
                ))]
            }
        }
    }

    fn translate_event(&mut self, event: notify::Event) -> Vec<RawEvent> {
        let tracker = event.tracker();
        let mut out = Vec::new();

        // A move whose other half never shows up left the watched directory
        if !self.continues_pending(&event.kind, tracker) {
            self.flush_pending(&mut out);
        }

        match event.kind {
            EventKind::Create(kind) => {
                for path in event.paths {
                    let is_dir = match kind {
                        CreateKind::File => Some(false),
                        CreateKind::Folder => Some(true),
                        _ => Some(path.is_dir()),
                    };
                    self.push_named(&mut out, ChangeKind::Created, path, is_dir);
                }
            }
            EventKind::Remove(kind) => {
                for path in event.paths {
                    let is_dir = match kind {
                        RemoveKind::File => Some(false),
                        RemoveKind::Folder => Some(true),
                        _ => None,
                    };
                    self.push_named(&mut out, ChangeKind::Deleted, path, is_dir);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => {
                self.translate_rename(&mut out, mode, tracker, event.paths);
            }
            EventKind::Modify(modify) => {
                let trigger = match modify {
                    ModifyKind::Metadata(MetadataKind::WriteTime | MetadataKind::Any) => {
                        NotifyTriggers::LAST_WRITE
                    }
                    ModifyKind::Metadata(MetadataKind::AccessTime) => NotifyTriggers::LAST_ACCESS,
                    ModifyKind::Metadata(_) => NotifyTriggers::ATTRIBUTES,
                    _ => NotifyTriggers::LAST_WRITE,
                };
                self.push_changed(&mut out, trigger, event.paths);
            }
            EventKind::Access(_) => {
                self.push_changed(&mut out, NotifyTriggers::LAST_ACCESS, event.paths);
            }
            EventKind::Any => {
                self.push_changed(&mut out, NotifyTriggers::LAST_WRITE, event.paths);
            }
            EventKind::Other => {
                tracing::trace!(?event, "Ignoring backend-specific event");
            }
        }

        out
    }

    fn translate_rename(
        &mut self,
        out: &mut Vec<RawEvent>,
        mode: RenameMode,
        tracker: Option<usize>,
        mut paths: Vec<PathBuf>,
    ) {
        match mode {
            RenameMode::Both if paths.len() >= 2 => {
                self.pending_from = None;
                let to = paths.swap_remove(1);
                let from = paths.swap_remove(0);
                self.push_renamed(out, from, to);
            }
            RenameMode::From => {
                self.pending_from = paths.pop().map(|path| PendingFrom { tracker, path });
            }
            RenameMode::To => {
                for to in paths {
                    match self.pending_from.take() {
                        // inotify follows a matched pair with `Both`, which reports it
                        Some(from) if from.tracker.is_some() => self.pending_from = Some(from),
                        Some(from) => self.push_renamed(out, from.path, to),
                        None => {
                            let is_dir = Some(to.is_dir());
                            self.push_named(out, ChangeKind::Created, to, is_dir);
                        }
                    }
                }
            }
            // FSEvents reports each side of a rename separately with no pairing
            _ => {
                for path in paths {
                    if path.exists() {
                        let is_dir = Some(path.is_dir());
                        self.push_named(out, ChangeKind::Created, path, is_dir);
                    } else {
                        self.push_named(out, ChangeKind::Deleted, path, None);
                    }
                }
            }
        }
    }

    fn continues_pending(&self, kind: &EventKind, tracker: Option<usize>) -> bool {
        let is_second_half = matches!(
            kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        );
        is_second_half
            && self
                .pending_from
                .as_ref()
                .is_some_and(|pending| pending.tracker == tracker)
    }

    fn flush_pending(&mut self, out: &mut Vec<RawEvent>) {
        if let Some(pending) = self.pending_from.take() {
            self.push_named(out, ChangeKind::Deleted, pending.path, None);
        }
    }

    fn name_triggered(&self, is_dir: Option<bool>) -> bool {
        let triggers = self.spec.triggers;
        match is_dir {
            Some(true) => triggers.contains(NotifyTriggers::DIRECTORY_NAME),
            Some(false) => triggers.contains(NotifyTriggers::FILE_NAME),
            None => triggers.intersects(NotifyTriggers::FILE_NAME | NotifyTriggers::DIRECTORY_NAME),
        }
    }

    fn push_named(
        &self,
        out: &mut Vec<RawEvent>,
        kind: ChangeKind,
        path: PathBuf,
        is_dir: Option<bool>,
    ) {
        if !self.spec.matches(&file_name_of(&path)) || !self.name_triggered(is_dir) {
            return;
        }
        let event = FileSystemEvent::new(kind, path);
        out.push(match kind {
            ChangeKind::Deleted => RawEvent::Deleted(event),
            _ => RawEvent::Created(event),
        });
    }

    fn push_renamed(&self, out: &mut Vec<RawEvent>, from: PathBuf, to: PathBuf) {
        let matches =
            self.spec.matches(&file_name_of(&from)) || self.spec.matches(&file_name_of(&to));
        if !matches || !self.name_triggered(Some(to.is_dir())) {
            return;
        }
        out.push(RawEvent::Renamed(RenamedEvent::new(from, to)));
    }

    fn push_changed(&self, out: &mut Vec<RawEvent>, trigger: NotifyTriggers, paths: Vec<PathBuf>) {
        if !self.spec.triggers.contains(trigger) {
            return;
        }
        for path in paths {
            if self.spec.matches(&file_name_of(&path)) {
                out.push(RawEvent::Changed(FileSystemEvent::new(ChangeKind::Changed, path)));
            }
        }
    }
}

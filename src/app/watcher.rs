// Lectern - app/watcher.rs
//
// Debounced single-file watcher: reloads the open document when it changes
// on disk, collapsing editor autosave bursts into one reload.
//
// Architecture:
//   - `FileWatcher` lives on the UI thread and owns everything.
//   - The notify backend delivers raw events on its own thread into an mpsc
//     channel. Our observer thread (`run_observer`) filters them against the
//     shared `WatchTarget` and forwards `WatchSignal`s for exact path matches.
//   - The UI thread calls `poll` each frame. `poll` drains the signals,
//     re-arms the `Debouncer`, and runs the callback once the quiet period
//     has elapsed, so the callback never runs on a background thread.
//   - Each target carries a generation number. Retargeting or
//     `stop_watching` bumps it, so signals already in flight for the old
//     target are discarded when drained.
//   - The parent directory is watched, not the file: some backends cannot
//     watch a single file, and editors that save by rename replace the inode.
//
// Failure handling:
//   - A directory that cannot be watched is logged at WARN and reported as
//     `WatchError::Setup`; no watch is established and nothing panics.
//   - If the observer thread dies, `poll` notices the closed channel, drops
//     the backend and clears the current watch; the next `watch` starts a
//     fresh one.

use crate::app::debounce::Debouncer;
use crate::util::constants::{
    DEFAULT_WATCH_DEBOUNCE_MS, MAX_WATCH_SIGNALS_PER_POLL, WATCH_CANCEL_CHECK_INTERVAL_MS,
};
use crate::util::error::WatchError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// =============================================================================
// Shared state
// =============================================================================

/// What the observer thread compares incoming events against.
#[derive(Debug, Default)]
struct WatchTarget {
    path: Option<PathBuf>,
    generation: u64,
}

/// A matching change forwarded from the observer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WatchSignal {
    generation: u64,
}

/// The current watch as seen from the UI thread.
struct ActiveWatch<A> {
    path: PathBuf,
    directory: PathBuf,
    generation: u64,
    callback: Box<dyn FnMut(&A)>,
    args: A,
}

/// Running backend plus its observer thread.
struct Observer {
    backend: RecommendedWatcher,
    thread: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    signal_rx: mpsc::Receiver<WatchSignal>,
}

// =============================================================================
// FileWatcher
// =============================================================================

/// Watches at most one file and invokes a callback, debounced, when it changes.
///
/// `A` is the argument bound to the callback by `watch`.
pub struct FileWatcher<A> {
    target: Arc<Mutex<WatchTarget>>,
    debounce: Debouncer<u64>,
    observer: Option<Observer>,
    active: Option<ActiveWatch<A>>,
}

impl<A> FileWatcher<A> {
    /// Create an idle watcher. No thread is started until `watch` or `start`.
    pub fn new(debounce: Duration) -> Self {
        Self {
            target: Arc::new(Mutex::new(WatchTarget::default())),
            debounce: Debouncer::new(debounce),
            observer: None,
            active: None,
        }
    }

    /// Returns `true` while the observer thread is alive.
    pub fn is_running(&self) -> bool {
        self.observer
            .as_ref()
            .is_some_and(|o| !o.thread.is_finished())
    }

    /// The file currently watched, as an absolute path.
    pub fn watched_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// `true` while a reload is scheduled but not yet run.
    pub fn is_pending(&self) -> bool {
        self.debounce.is_armed()
    }

    /// How long until the scheduled reload runs, so a UI loop can sleep
    /// exactly that long. `None` when nothing is scheduled.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.debounce.time_remaining(now)
    }

    /// Start the backend and observer thread if they are not running.
    pub fn start(&mut self) -> Result<(), WatchError> {
        self.ensure_observer().map(|_| ())
    }

    fn ensure_observer(&mut self) -> Result<&mut Observer, WatchError> {
        let observer = match self.observer.take() {
            Some(observer) => observer,
            None => spawn_observer(Arc::clone(&self.target))?,
        };
        Ok(self.observer.insert(observer))
    }

    /// Watch `path`, replacing any previous watch, and call
    /// `callback(&args)` after each burst of changes to it.
    ///
    /// Only the parent directory is registered with the backend. Events for
    /// other files in that directory are filtered out on the observer thread.
    pub fn watch<F>(&mut self, path: &Path, callback: F, args: A) -> Result<(), WatchError>
    where
        F: FnMut(&A) + 'static,
    {
        self.stop_watching();

        let (path, directory) = resolve_target(path)?;
        let observer = self.ensure_observer()?;

        if let Err(source) = observer.backend.watch(&directory, RecursiveMode::NonRecursive) {
            tracing::warn!(
                directory = %directory.display(),
                error = %source,
                "Impossible to watch directory; document will not reload on change"
            );
            return Err(WatchError::Setup { directory, source });
        }

        let generation = {
            let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
            target.generation += 1;
            target.path = Some(path.clone());
            target.generation
        };

        tracing::info!(path = %path.display(), generation, "Watching file");
        self.active = Some(ActiveWatch {
            path,
            directory,
            generation,
            callback: Box::new(callback),
            args,
        });
        Ok(())
    }

    /// Stop reacting to changes. Cancels any scheduled reload.
    pub fn stop_watching(&mut self) {
        self.debounce.cancel();
        {
            let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
            target.generation += 1;
            target.path = None;
        }

        let Some(active) = self.active.take() else {
            return;
        };
        if let Some(observer) = self.observer.as_mut() {
            if let Err(e) = observer.backend.unwatch(&active.directory) {
                // The directory may have been removed; nothing left to detach.
                tracing::debug!(
                    directory = %active.directory.display(),
                    error = %e,
                    "Unwatch failed"
                );
            }
        }
        tracing::debug!(path = %active.path.display(), "Stopped watching file");
    }

    /// Stop the backend and observer thread. With `wait`, block until the
    /// thread has exited.
    pub fn stop(&mut self, wait: bool) {
        self.stop_watching();

        let Some(observer) = self.observer.take() else {
            return;
        };
        observer.cancel.store(true, Ordering::SeqCst);
        // Dropping the backend closes the raw event channel.
        drop(observer.backend);

        if wait {
            if observer.thread.join().is_err() {
                tracing::warn!("File observer thread panicked");
            }
            tracing::debug!("File observer stopped");
        }
    }

    /// Drain forwarded changes and run the callback if its quiet period has
    /// elapsed. Call once per UI frame. Returns `true` if the callback ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut signals = Vec::new();
        let mut disconnected = false;

        if let Some(observer) = &self.observer {
            while signals.len() < MAX_WATCH_SIGNALS_PER_POLL {
                match observer.signal_rx.try_recv() {
                    Ok(signal) => signals.push(signal),
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected {
            self.observer = None;
            self.debounce.cancel();
            {
                let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
                target.generation += 1;
                target.path = None;
            }
            match self.active.take() {
                Some(active) => tracing::warn!(
                    path = %active.path.display(),
                    "File observer thread exited; file is no longer watched"
                ),
                None => tracing::warn!("File observer thread exited"),
            }
            // Signals drained above now belong to no watch and are dropped.
        }

        for signal in signals {
            self.handle_signal(signal, now);
        }
        self.fire_due(now)
    }

    fn handle_signal(&mut self, signal: WatchSignal, now: Instant) {
        match &self.active {
            Some(active) if active.generation == signal.generation => {
                tracing::trace!(path = %active.path.display(), "Change detected; debouncing");
                self.debounce.arm(now, signal.generation);
            }
            _ => tracing::trace!(generation = signal.generation, "Dropping stale change"),
        }
    }

    fn fire_due(&mut self, now: Instant) -> bool {
        let Some(generation) = self.debounce.take_due(now) else {
            return false;
        };
        match self.active.as_mut() {
            Some(active) if active.generation == generation => {
                tracing::debug!(path = %active.path.display(), "File changed; running callback");
                (active.callback)(&active.args);
                true
            }
            _ => false,
        }
    }
}

impl<A> Default for FileWatcher<A> {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS))
    }
}

impl<A> Drop for FileWatcher<A> {
    fn drop(&mut self) {
        self.stop(false);
    }
}

impl<A> fmt::Debug for FileWatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watched_path", &self.watched_path())
            .field("running", &self.is_running())
            .field("pending", &self.is_pending())
            .field("delay", &self.debounce.delay())
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Make `path` absolute and split off the directory to register.
///
/// The directory is canonicalised when it exists so the target matches the
/// paths the backend reports (macOS reports `/private/var` for `/var`).
fn resolve_target(path: &Path) -> Result<(PathBuf, PathBuf), WatchError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .map_err(|source| WatchError::Io {
                path: path.to_path_buf(),
                source,
            })?
    };

    let (Some(parent), Some(file_name)) = (absolute.parent(), absolute.file_name()) else {
        return Err(WatchError::NoParent { path: absolute });
    };
    let directory = parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf());
    let target = directory.join(file_name);
    Ok((target, directory))
}

/// Which events count as "the file changed".
///
/// Data writes, renames onto the path (atomic saves) and creation count.
/// Metadata-only changes (touch, chmod), renames away, removals and reads
/// do not.
fn is_reload_trigger(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(ModifyKind::Name(mode)) => {
            matches!(mode, RenameMode::To | RenameMode::Both | RenameMode::Any)
        }
        EventKind::Modify(_) | EventKind::Create(_) => true,
        _ => false,
    }
}

/// `true` when a trigger event lands on `target`.
///
/// A paired rename reports `[from, to]`, so only the destination counts.
/// An unpaired rename (`Any`, as FSEvents reports) is seen for both ends;
/// it counts only if `target` still exists afterwards.
fn lands_on_target(event: &Event, target: &Path) -> bool {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().is_some_and(|p| p == target)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().any(|p| p == target) && target.exists()
        }
        _ => event.paths.iter().any(|p| p == target),
    }
}

fn spawn_observer(target: Arc<Mutex<WatchTarget>>) -> Result<Observer, WatchError> {
    let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
    let backend = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // The observer may already be gone during shutdown.
        let _ = raw_tx.send(res);
    })
    .map_err(|source| WatchError::Backend { source })?;

    let (signal_tx, signal_rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let thread_cancel = Arc::clone(&cancel);

    let thread = std::thread::Builder::new()
        .name("lectern-file-observer".to_string())
        .spawn(move || run_observer(raw_rx, target, signal_tx, thread_cancel))
        .map_err(|source| WatchError::Spawn { source })?;

    tracing::debug!("File observer started");
    Ok(Observer {
        backend,
        thread,
        cancel,
        signal_rx,
    })
}

/// Observer thread body: forward events whose path equals the target.
fn run_observer(
    raw_rx: mpsc::Receiver<notify::Result<Event>>,
    target: Arc<Mutex<WatchTarget>>,
    signal_tx: mpsc::Sender<WatchSignal>,
    cancel: Arc<AtomicBool>,
) {
    let tick = Duration::from_millis(WATCH_CANCEL_CHECK_INTERVAL_MS);

    while !cancel.load(Ordering::Relaxed) {
        let event = match raw_rx.recv_timeout(tick) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "File-system event backend error");
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if !is_reload_trigger(&event.kind) {
            continue;
        }

        let (path, generation) = {
            let target = target.lock().unwrap_or_else(PoisonError::into_inner);
            match &target.path {
                Some(path) => (path.clone(), target.generation),
                None => continue,
            }
        };

        // A failed send means the UI side dropped the receiver.
        if lands_on_target(&event, &path) && signal_tx.send(WatchSignal { generation }).is_err() {
            break;
        }
    }

    tracing::debug!("File observer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const DELAY: Duration = Duration::from_millis(200);

    /// Install an active watch without touching the backend, so the
    /// debounce logic can be driven with synthetic signals.
    fn bind(
        watcher: &mut FileWatcher<String>,
        generation: u64,
        args: &str,
    ) -> Rc<RefCell<Vec<String>>> {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        watcher.active = Some(ActiveWatch {
            path: PathBuf::from("/slides/talk.pdf"),
            directory: PathBuf::from("/slides"),
            generation,
            callback: Box::new(move |a: &String| sink.borrow_mut().push(a.clone())),
            args: args.to_string(),
        });
        calls
    }

    #[test]
    fn test_burst_of_changes_runs_callback_once() {
        let mut watcher = FileWatcher::new(DELAY);
        let calls = bind(&mut watcher, 1, "reload");
        let t0 = Instant::now();

        for i in 0..10 {
            watcher.handle_signal(WatchSignal { generation: 1 }, t0 + Duration::from_millis(i * 15));
            assert!(!watcher.fire_due(t0 + Duration::from_millis(i * 15)));
        }
        let last = t0 + Duration::from_millis(135);
        assert!(!watcher.fire_due(last + Duration::from_millis(199)));
        assert!(watcher.fire_due(last + DELAY));
        assert!(!watcher.fire_due(last + DELAY * 5));

        assert_eq!(*calls.borrow(), vec!["reload".to_string()]);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut watcher = FileWatcher::new(DELAY);
        let calls = bind(&mut watcher, 2, "current");
        let t0 = Instant::now();

        watcher.handle_signal(WatchSignal { generation: 1 }, t0);
        assert!(!watcher.is_pending());
        assert!(!watcher.fire_due(t0 + DELAY));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_stop_watching_cancels_pending_callback() {
        let mut watcher = FileWatcher::new(DELAY);
        let calls = bind(&mut watcher, 1, "reload");
        let t0 = Instant::now();

        watcher.handle_signal(WatchSignal { generation: 1 }, t0);
        assert!(watcher.is_pending());
        watcher.stop_watching();

        assert!(!watcher.is_pending());
        assert!(!watcher.poll(t0 + DELAY));
        assert!(watcher.watched_path().is_none());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_time_until_due_tracks_latest_change() {
        let mut watcher = FileWatcher::new(DELAY);
        let _calls = bind(&mut watcher, 1, "x");
        let t0 = Instant::now();
        assert_eq!(watcher.time_until_due(t0), None);

        watcher.handle_signal(WatchSignal { generation: 1 }, t0 + Duration::from_millis(100));
        assert_eq!(
            watcher.time_until_due(t0 + Duration::from_millis(150)),
            Some(Duration::from_millis(150))
        );
    }

    #[test]
    fn test_reload_trigger_kinds() {
        assert!(is_reload_trigger(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_reload_trigger(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(is_reload_trigger(&EventKind::Modify(ModifyKind::Name(
            RenameMode::Both
        ))));
        assert!(is_reload_trigger(&EventKind::Create(CreateKind::File)));
        assert!(!is_reload_trigger(&EventKind::Modify(ModifyKind::Name(
            RenameMode::From
        ))));
        assert!(!is_reload_trigger(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime
        ))));
        assert!(!is_reload_trigger(&EventKind::Access(AccessKind::Read)));
        assert!(!is_reload_trigger(&EventKind::Remove(
            notify::event::RemoveKind::File
        )));
    }

    fn rename_event(mode: RenameMode, paths: &[&Path]) -> Event {
        let mut event = Event::new(EventKind::Modify(ModifyKind::Name(mode)));
        for path in paths {
            event = event.add_path(path.to_path_buf());
        }
        event
    }

    #[test]
    fn test_rename_counts_only_when_landing_on_target() {
        let dir = TempDir::new().expect("tmpdir");
        let doc = dir.path().join("talk.pdf");
        let other = dir.path().join("talk-old.pdf");

        // Saved via a temp file renamed onto the document.
        assert!(lands_on_target(
            &rename_event(RenameMode::Both, &[&other, &doc]),
            &doc
        ));
        // Document renamed away.
        assert!(!lands_on_target(
            &rename_event(RenameMode::Both, &[&doc, &other]),
            &doc
        ));

        // Unpaired renames are judged by whether the document is still there.
        let moved_away = rename_event(RenameMode::Any, &[&doc]);
        assert!(!lands_on_target(&moved_away, &doc));
        std::fs::write(&doc, b"v2").expect("write");
        assert!(lands_on_target(&moved_away, &doc));

        let data = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(doc.clone());
        assert!(lands_on_target(&data, &doc));
        assert!(!lands_on_target(&data, &other));
    }

    #[test]
    fn test_resolve_target_makes_relative_paths_absolute() {
        let (path, directory) = resolve_target(Path::new("talk.pdf")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("talk.pdf"));
        assert_eq!(path.parent(), Some(directory.as_path()));
    }

    #[test]
    fn test_resolve_target_rejects_root() {
        let err = resolve_target(Path::new("/")).unwrap_err();
        assert!(matches!(err, WatchError::NoParent { .. }));
    }

    #[test]
    fn test_missing_directory_fails_softly() {
        let dir = TempDir::new().expect("tmpdir");
        let missing = dir.path().join("gone").join("talk.pdf");
        let mut watcher: FileWatcher<()> = FileWatcher::new(DELAY);

        let err = watcher.watch(&missing, |_| {}, ()).unwrap_err();
        assert!(matches!(err, WatchError::Setup { .. }), "{err:?}");
        assert!(watcher.watched_path().is_none());
        watcher.stop(true);
    }

    #[test]
    fn test_dead_observer_clears_watch() {
        let mut watcher: FileWatcher<String> = FileWatcher::new(DELAY);
        watcher.start().unwrap();
        let calls = bind(&mut watcher, 1, "reload");
        let t0 = Instant::now();
        watcher.handle_signal(WatchSignal { generation: 1 }, t0);

        // Ask the observer thread to exit; its sender is dropped with it.
        if let Some(observer) = &watcher.observer {
            observer.cancel.store(true, Ordering::SeqCst);
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while watcher.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!watcher.is_running());

        assert!(!watcher.poll(t0 + DELAY));
        assert!(watcher.watched_path().is_none());
        assert!(!watcher.is_pending());
        assert!(calls.borrow().is_empty());
        watcher.stop(true);
    }

    #[test]
    fn test_start_and_stop_thread() {
        let mut watcher: FileWatcher<()> = FileWatcher::default();
        assert!(!watcher.is_running());
        watcher.start().unwrap();
        assert!(watcher.is_running());
        watcher.start().unwrap();
        watcher.stop(true);
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_watch_records_canonical_target() {
        let dir = TempDir::new().expect("tmpdir");
        let file = dir.path().join("talk.pdf");
        std::fs::write(&file, b"v1").expect("write");

        let mut watcher: FileWatcher<()> = FileWatcher::new(DELAY);
        watcher.watch(&file, |_| {}, ()).unwrap();
        let expected = dir.path().canonicalize().unwrap().join("talk.pdf");
        assert_eq!(watcher.watched_path(), Some(expected.as_path()));
        assert!(watcher.is_running());
        watcher.stop(true);
        assert!(watcher.watched_path().is_none());
    }
}

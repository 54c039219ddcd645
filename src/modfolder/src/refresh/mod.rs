//! Load-event refresh signal
//!
//! Module loads and unloads anywhere in the process must make the shell
//! re-enumerate the folder. Loader callbacks run with the loader lock held,
//! so they only post a [`LoaderEvent`] onto a channel; a dedicated worker
//! thread drains it, maps events to its [`RefreshTarget`] and talks to the
//! shell through a [`ChangeNotifier`].

#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::iter;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::idlist::IdList;
use crate::Result;

/// Name given to the worker thread
pub const WORKER_THREAD_NAME: &str = "modfolder-refresh";

/// Which folder the shell should re-read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    /// Parsing name resolved by the shell at notification time
    ParsingName(String),
    /// Absolute identifier list of an initialized folder
    IdList(IdList),
}

/// Parsing name of the folder under its namespace parent, e.g.
/// `::{20D04FE0-...}\::{6B4E2E3B-...}`
pub fn folder_parsing_name(namespace_parent: &str, class_id: &str) -> String {
    format!("{}\\::{}", namespace_parent, class_id)
}

/// What the loader reported, with the module's base address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderEvent {
    Loaded { base: u64 },
    Unloaded { base: u64 },
}

impl fmt::Display for LoaderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderEvent::Loaded { base } => write!(f, "module loaded at {:#x}", base),
            LoaderEvent::Unloaded { base } => write!(f, "module unloaded from {:#x}", base),
        }
    }
}

/// Delivers "directory contents changed" to the shell. Runs on the worker.
pub trait ChangeNotifier: Send + 'static {
    fn notify(&self, target: &RefreshTarget) -> Result<()>;
}

#[derive(Debug)]
enum Request {
    Refresh(RefreshTarget),
    Loader(LoaderEvent),
}

/// Cloneable handle for requesting a refresh from any thread
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: Sender<Request>,
}

impl RefreshSignal {
    /// Queue a refresh. Never blocks; a stopped worker drops the request.
    pub fn request(&self, target: RefreshTarget) {
        if self.tx.send(Request::Refresh(target)).is_err() {
            warn!("Refresh worker has stopped, request dropped");
        }
    }

    /// Entry point for loader callbacks. These run under the loader lock,
    /// so the event is posted as is and the worker does the rest.
    pub fn on_loader_event(&self, event: LoaderEvent) {
        let _ = self.tx.send(Request::Loader(event));
    }
}

/// Worker thread that owns all shell notifications
pub struct RefreshWorker {
    handle: JoinHandle<()>,
}

impl RefreshWorker {
    /// Start the worker. It exits after every [`RefreshSignal`] clone is gone.
    pub fn spawn<N: ChangeNotifier>(notifier: N) -> Result<(RefreshSignal, Self)> {
        Self::start(notifier, None)
    }

    /// Start a worker that also refreshes `loader_target` on every loader event
    pub fn spawn_watching<N: ChangeNotifier>(
        notifier: N,
        loader_target: RefreshTarget,
    ) -> Result<(RefreshSignal, Self)> {
        Self::start(notifier, Some(loader_target))
    }

    fn start<N: ChangeNotifier>(
        notifier: N,
        loader_target: Option<RefreshTarget>,
    ) -> Result<(RefreshSignal, Self)> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(notifier, loader_target, rx))?;
        info!("Refresh worker started");
        Ok((RefreshSignal { tx }, Self { handle }))
    }

    /// Wait for the worker to drain its queue and exit
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("Refresh worker panicked");
        }
    }
}

fn run<N: ChangeNotifier>(notifier: N, loader_target: Option<RefreshTarget>, rx: Receiver<Request>) {
    while let Ok(first) = rx.recv() {
        // Coalesce a burst into one notification per target
        let mut pending: Vec<RefreshTarget> = Vec::new();
        for request in iter::once(first).chain(rx.try_iter()) {
            let target = match request {
                Request::Refresh(target) => target,
                Request::Loader(event) => {
                    trace!("Loader reported {}", event);
                    match &loader_target {
                        Some(target) => target.clone(),
                        None => continue,
                    }
                }
            };
            if !pending.contains(&target) {
                pending.push(target);
            }
        }

        for target in &pending {
            debug!("Refreshing {:?}", target);
            if let Err(e) = notifier.notify(target) {
                warn!("Refresh notification failed: {}", e);
            }
        }
    }
    debug!("Refresh worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        seen: Arc<Mutex<Vec<(RefreshTarget, Option<String>)>>>,
    }

    impl ChangeNotifier for RecordingNotifier {
        fn notify(&self, target: &RefreshTarget) -> Result<()> {
            let thread_name = thread::current().name().map(str::to_string);
            self.seen.lock().unwrap().push((target.clone(), thread_name));
            Ok(())
        }
    }

    #[test]
    fn test_requests_delivered_on_worker() {
        let notifier = RecordingNotifier::default();
        let (signal, worker) = RefreshWorker::spawn(notifier.clone()).unwrap();

        signal.request(RefreshTarget::ParsingName("::{X}".to_string()));
        drop(signal);
        worker.join();

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, RefreshTarget::ParsingName("::{X}".to_string()));
        assert_eq!(seen[0].1.as_deref(), Some(WORKER_THREAD_NAME));
    }

    #[test]
    fn test_queued_duplicates_coalesce() {
        let (tx, rx) = mpsc::channel();
        let target = RefreshTarget::IdList(IdList::empty());
        for _ in 0..5 {
            tx.send(Request::Refresh(target.clone())).unwrap();
        }
        tx.send(Request::Refresh(RefreshTarget::ParsingName("other".into()))).unwrap();
        drop(tx);

        let notifier = RecordingNotifier::default();
        run(notifier.clone(), None, rx);

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, target);
    }

    #[test]
    fn test_loader_event_queues_target() {
        let notifier = RecordingNotifier::default();
        let target = RefreshTarget::ParsingName("folder".into());
        let (signal, worker) = RefreshWorker::spawn_watching(notifier.clone(), target.clone()).unwrap();

        signal.on_loader_event(LoaderEvent::Loaded { base: 0x10000 });
        drop(signal);
        worker.join();

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen[0].0, target);
        assert_eq!(seen[0].1.as_deref(), Some(WORKER_THREAD_NAME));
    }

    #[test]
    fn test_worker_joins_once_every_signal_is_gone() {
        let notifier = RecordingNotifier::default();
        let target = RefreshTarget::ParsingName("folder".into());
        let (signal, worker) = RefreshWorker::spawn_watching(notifier.clone(), target).unwrap();
        let folders: Vec<_> = (0..3).map(|_| signal.clone()).collect();

        folders[1].on_loader_event(LoaderEvent::Unloaded { base: 0x30000 });
        drop(folders);
        drop(signal);
        worker.join();

        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_loader_burst_coalesces() {
        let (tx, rx) = mpsc::channel();
        for base in 0..10u64 {
            tx.send(Request::Loader(LoaderEvent::Loaded { base: base << 16 })).unwrap();
        }
        tx.send(Request::Loader(LoaderEvent::Unloaded { base: 0x10000 })).unwrap();
        drop(tx);

        let target = RefreshTarget::ParsingName("folder".into());
        let notifier = RecordingNotifier::default();
        run(notifier.clone(), Some(target.clone()), rx);

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, target);
    }

    #[test]
    fn test_loader_event_without_target_is_ignored() {
        let (tx, rx) = mpsc::channel();
        tx.send(Request::Loader(LoaderEvent::Unloaded { base: 0x20000 })).unwrap();
        drop(tx);

        let notifier = RecordingNotifier::default();
        run(notifier.clone(), None, rx);
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_loader_event_display() {
        assert_eq!(
            LoaderEvent::Loaded { base: 0x7ff0_0000 }.to_string(),
            "module loaded at 0x7ff00000"
        );
        assert_eq!(
            LoaderEvent::Unloaded { base: 0x1000 }.to_string(),
            "module unloaded from 0x1000"
        );
    }

    #[test]
    fn test_request_after_worker_stopped() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let signal = RefreshSignal { tx };
        // Logged and dropped, never panics
        signal.request(RefreshTarget::ParsingName("gone".into()));
    }

    #[test]
    fn test_folder_parsing_name() {
        assert_eq!(
            folder_parsing_name("::{20D04FE0-3AEA-1069-A2D8-08002B30309D}", crate::CLASS_ID),
            "::{20D04FE0-3AEA-1069-A2D8-08002B30309D}\\::{6B4E2E3B-3D6B-4D4E-9A1C-0F0C8D8E8F11}"
        );
    }
}

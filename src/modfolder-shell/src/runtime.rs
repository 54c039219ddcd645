//! Process-wide server state: object counts, the module handle and the
//! lazily started refresh machinery

use std::ffi::c_void;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};
use winapi::shared::minwindef::HINSTANCE;
use winapi::um::libloaderapi::GetModuleFileNameW;

use modfolder::config::Config;
use modfolder::host::WindowsShell;
use modfolder::inventory::NativeModules;
use modfolder::refresh::windows::{LoaderHook, ShellNotifier};
use modfolder::refresh::{folder_parsing_name, RefreshTarget};
use modfolder::wide::from_wide;
use modfolder::{Error, Inventory, ModuleFolder, RefreshSignal, RefreshWorker, Result, CLASS_ID};

/// Folder as served to the shell
pub type ShellFolder = ModuleFolder<NativeModules, WindowsShell>;

static OBJECTS: AtomicUsize = AtomicUsize::new(0);
static LOCKS: AtomicUsize = AtomicUsize::new(0);
static MODULE: AtomicPtr<c_void> = AtomicPtr::new(std::ptr::null_mut());
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

pub fn object_created() {
    OBJECTS.fetch_add(1, Ordering::AcqRel);
}

pub fn object_destroyed() {
    OBJECTS.fetch_sub(1, Ordering::AcqRel);
}

/// `IClassFactory::LockServer`
pub fn lock_server(lock: bool) {
    if lock {
        LOCKS.fetch_add(1, Ordering::AcqRel);
    } else {
        // Unbalanced unlocks leave the count at zero
        let _ = LOCKS.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// Live objects or server locks keep the DLL loaded
pub fn in_use() -> bool {
    OBJECTS.load(Ordering::Acquire) > 0 || LOCKS.load(Ordering::Acquire) > 0
}

pub fn set_module(instance: HINSTANCE) {
    MODULE.store(instance as *mut c_void, Ordering::Release);
}

/// Full path of this DLL
pub fn module_path() -> Result<String> {
    let module = MODULE.load(Ordering::Acquire) as HINSTANCE;
    let mut buf = vec![0u16; 32768];
    let len = unsafe { GetModuleFileNameW(module, buf.as_mut_ptr(), buf.len() as u32) };
    if len == 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    Ok(from_wide(&buf[..len as usize]))
}

/// Loader hook and refresh worker, started with the first folder
struct Refresh {
    signal: RefreshSignal,
    worker: RefreshWorker,
    hook: Option<LoaderHook>,
}

impl Refresh {
    fn start(config: &Config) -> Result<Self> {
        let target = RefreshTarget::ParsingName(folder_parsing_name(&config.namespace_parent, CLASS_ID));
        let (signal, worker) = RefreshWorker::spawn_watching(ShellNotifier, target)?;
        let hook = match LoaderHook::register(signal.clone()) {
            Ok(hook) => Some(hook),
            Err(e) => {
                warn!("Loader notifications unavailable: {}", e);
                None
            }
        };
        Ok(Self { signal, worker, hook })
    }

    /// Unhook and wait for the worker. Every folder holding a signal clone
    /// must already be gone, or the worker never sees its channel close.
    fn stop(self) {
        let Self { signal, worker, hook } = self;
        drop(hook);
        drop(signal);
        worker.join();
    }
}

pub struct Runtime {
    pub config: Config,
    refresh: Mutex<Option<Refresh>>,
}

impl Runtime {
    fn start() -> Self {
        let (config, config_error) = match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        };
        // Nowhere to report a logging failure from inside the shell
        let _ = modfolder::logging::init_from_config(&config);
        info!(
            "modfolder-shell {} starting in process {}",
            env!("CARGO_PKG_VERSION"),
            std::process::id()
        );
        if let Some(e) = config_error {
            warn!("Using default configuration: {}", e);
        }

        Self {
            config,
            refresh: Mutex::new(None),
        }
    }

    /// Refresh signal, starting the worker and hook if they are not running
    fn signal(&self) -> Option<RefreshSignal> {
        let mut refresh = self.refresh.lock().ok()?;
        if refresh.is_none() {
            match Refresh::start(&self.config) {
                Ok(started) => *refresh = Some(started),
                Err(e) => {
                    warn!("Refresh worker failed to start: {}", e);
                    return None;
                }
            }
        }
        refresh.as_ref().map(|r| r.signal.clone())
    }

    fn take_refresh(&self) -> Option<Refresh> {
        self.refresh.lock().ok().and_then(|mut refresh| refresh.take())
    }

    /// A new folder wired to the configured inventory and refresh signal
    pub fn folder(&self) -> ShellFolder {
        let inventory =
            Inventory::native().with_unload_attempt_limit(self.config.unload_attempt_limit);
        let host = WindowsShell::new(self.config.display_name.clone());
        let folder = ModuleFolder::new(inventory, host).with_error_dialogs(self.config.error_dialogs);
        match self.signal() {
            Some(signal) => folder.with_refresh(signal),
            None => folder,
        }
    }
}

/// Server state, started on first use
pub fn get() -> &'static Runtime {
    RUNTIME.get_or_init(Runtime::start)
}

/// Stop the refresh machinery once no object can use it, so no thread is
/// left running this DLL's code when it is unloaded. Must not be called
/// under the loader lock.
pub fn stop_refresh() {
    let Some(refresh) = RUNTIME.get().and_then(Runtime::take_refresh) else {
        return;
    };
    refresh.stop();
    debug!("Refresh stopped");
}

/// Release the loader hook from `DllMain`. The loader lock is held, so the
/// worker is left to exit on its own once its channel closes.
pub fn shutdown() {
    if let Some(refresh) = RUNTIME.get().and_then(Runtime::take_refresh) {
        drop(refresh.hook);
    }
}

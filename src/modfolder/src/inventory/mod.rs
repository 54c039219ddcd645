//! Process module inventory
//!
//! Lists the modules mapped into the current process and performs the two
//! mutations the folder offers: loading modules that are not yet mapped and
//! forcing a module out by dropping every reference to it.
//!
//! The OS side lives behind [`ModuleApi`]; [`NativeModules`] picks the backend
//! for the build target.

#[cfg(test)]
pub mod mock;
mod traits;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

pub use crate::pidl::ModuleRecord;
pub use traits::ModuleApi;

#[cfg(windows)]
pub use self::windows::WindowsModules as NativeModules;

#[cfg(unix)]
pub use self::unix::UnixModules as NativeModules;

use tracing::{debug, error, info, trace, warn};

use crate::Result;

/// Default cap on reference drops attempted by [`Inventory::force_unload`]
pub const DEFAULT_UNLOAD_ATTEMPT_LIMIT: usize = 100;

/// Handle count assumed before the first module-table query
pub const INITIAL_MODULE_CAPACITY: usize = 1024;

/// Fill a buffer through an OS call that reports how many entries it needed,
/// growing it once when the first guess was too small.
///
/// `fill` writes into the slice it is given and returns the number of entries
/// available. When the table grows again between the two calls the second
/// result is truncated to what fits.
pub fn collect_with_growth<T, F>(initial: usize, mut fill: F) -> Result<Vec<T>>
where
    T: Default + Clone,
    F: FnMut(&mut [T]) -> Result<usize>,
{
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(initial)?;
    buffer.resize(initial, T::default());

    let mut needed = fill(&mut buffer)?;
    if needed > buffer.len() {
        debug!("Growing module buffer from {} to {}", buffer.len(), needed);
        buffer.try_reserve_exact(needed - buffer.len())?;
        buffer.resize(needed, T::default());
        needed = fill(&mut buffer)?;
    }

    buffer.truncate(needed.min(buffer.len()));
    Ok(buffer)
}

/// Module inventory over an OS backend
pub struct Inventory<A: ModuleApi> {
    api: A,
    unload_attempt_limit: usize,
}

#[cfg(any(windows, unix))]
impl Inventory<NativeModules> {
    /// Inventory over this platform's loader
    pub fn native() -> Self {
        Self::new(NativeModules::default())
    }
}

impl<A: ModuleApi> Inventory<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            unload_attempt_limit: DEFAULT_UNLOAD_ATTEMPT_LIMIT,
        }
    }

    pub fn with_unload_attempt_limit(mut self, limit: usize) -> Self {
        self.unload_attempt_limit = limit.max(1);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn unload_attempt_limit(&self) -> usize {
        self.unload_attempt_limit
    }

    /// Snapshot of the modules currently mapped. Failure to query the table
    /// is logged and yields an empty list.
    pub fn list_loaded_modules(&self) -> Vec<ModuleRecord> {
        match self.api.modules() {
            Ok(modules) => {
                for module in &modules {
                    trace!(
                        "{:#x} {:#x} {}",
                        module.base_address,
                        module.image_size,
                        module.path
                    );
                }
                info!("Listed {} loaded modules", modules.len());
                modules
            }
            Err(e) => {
                error!("Module enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Map every path that is not mapped yet, leaking the new references.
    ///
    /// `on_failure` receives the path and OS error code of each failed load;
    /// the batch continues past failures. Returns the number of modules
    /// actually loaded.
    pub fn load_if_absent<I, S, F>(&self, paths: I, mut on_failure: F) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str, u32),
    {
        let mut loaded = 0;
        for path in paths {
            let path = path.as_ref();
            if self.api.is_loaded(path) {
                info!("Already loaded, skipping: {}", path);
                continue;
            }
            match self.api.load(path) {
                Ok(base) => {
                    info!("Loaded {} at {:#x}", path, base);
                    loaded += 1;
                }
                Err(e) => {
                    error!("Load of {} failed: {}", path, e);
                    on_failure(path, e.os_code().unwrap_or(0));
                }
            }
        }
        loaded
    }

    /// Drop references to the module at `base_address` until the loader
    /// reports it is gone.
    ///
    /// Succeeds when at least one reference was dropped and a later drop
    /// failed. Fails when the first drop fails (not a module) or when the
    /// attempt limit is reached with the module still mapped.
    pub fn force_unload(&self, base_address: u64) -> bool {
        let mut released = 0usize;
        while released < self.unload_attempt_limit {
            match self.api.release(base_address) {
                Ok(()) => released += 1,
                Err(e) if released == 0 => {
                    error!("{:#x} is not a loaded module: {}", base_address, e);
                    return false;
                }
                Err(_) => {
                    info!(
                        "Unloaded {:#x} after {} reference drops",
                        base_address, released
                    );
                    return true;
                }
            }
        }
        warn!(
            "{:#x} still loaded after {} reference drops",
            base_address, released
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockModules;
    use super::*;
    use crate::Error;

    fn record(path: &str, base: u64, size: u32) -> ModuleRecord {
        ModuleRecord::new(path, base, size)
    }

    #[test]
    fn test_list_loaded_modules() {
        let inventory = Inventory::new(MockModules::with_modules(vec![
            record("C:\\a.dll", 0x10000, 0x2000),
            record("C:\\b.dll", 0x20000, 0x1000),
        ]));
        let modules = inventory.list_loaded_modules();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].path, "C:\\a.dll");
    }

    #[test]
    fn test_list_failure_is_empty() {
        let api = MockModules::default();
        api.fail_listing();
        let inventory = Inventory::new(api);
        assert!(inventory.list_loaded_modules().is_empty());
    }

    #[test]
    fn test_load_if_absent_skips_loaded() {
        let inventory = Inventory::new(MockModules::with_modules(vec![record(
            "C:\\already_loaded.dll",
            0x10000,
            0x1000,
        )]));

        let mut failures = Vec::new();
        let count = inventory.load_if_absent(["C:\\already_loaded.dll"], |p, c| {
            failures.push((p.to_string(), c))
        });

        assert_eq!(count, 0);
        assert_eq!(inventory.api().load_calls(), 0);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_load_if_absent_continues_after_failure() {
        let api = MockModules::default();
        api.fail_load("C:\\missing.dll", 126);
        let inventory = Inventory::new(api);

        let mut failures = Vec::new();
        let count = inventory.load_if_absent(
            vec!["C:\\missing.dll".to_string(), "C:\\new.dll".to_string()],
            |p, c| failures.push((p.to_string(), c)),
        );

        assert_eq!(count, 1);
        assert_eq!(failures, [("C:\\missing.dll".to_string(), 126)]);
        assert!(inventory.api().is_loaded("C:\\new.dll"));
    }

    #[test]
    fn test_force_unload_after_two_references() {
        let api = MockModules::with_modules(vec![record("C:\\twice.dll", 0x50000, 0x1000)]);
        api.add_reference(0x50000);
        let inventory = Inventory::new(api);

        assert!(inventory.force_unload(0x50000));
        // Two successful drops, then the failing probe
        assert_eq!(inventory.api().release_calls(), 3);
        assert!(!inventory.api().is_loaded("C:\\twice.dll"));
    }

    #[test]
    fn test_force_unload_unknown_address() {
        let inventory = Inventory::new(MockModules::default());
        assert!(!inventory.force_unload(0xDEAD0000));
        assert_eq!(inventory.api().release_calls(), 1);
    }

    #[test]
    fn test_force_unload_hits_limit() {
        let api = MockModules::with_modules(vec![record("C:\\pinned.dll", 0x70000, 0x1000)]);
        api.pin(0x70000);
        let inventory = Inventory::new(api).with_unload_attempt_limit(5);

        assert!(!inventory.force_unload(0x70000));
        assert_eq!(inventory.api().release_calls(), 5);
    }

    #[test]
    fn test_collect_with_growth_retries_once() {
        let table: Vec<u32> = (0..1500).collect();
        let mut calls = 0;

        let result = collect_with_growth(1024, |buf: &mut [u32]| {
            calls += 1;
            let n = buf.len().min(table.len());
            buf[..n].copy_from_slice(&table[..n]);
            Ok(table.len())
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(result, table);
    }

    #[test]
    fn test_collect_with_growth_truncates() {
        let result = collect_with_growth(8, |buf: &mut [u8]| {
            buf[..3].copy_from_slice(&[1, 2, 3]);
            Ok(3)
        })
        .unwrap();
        assert_eq!(result, [1, 2, 3]);
    }

    #[test]
    fn test_collect_with_growth_propagates_error() {
        let result: Result<Vec<u8>> = collect_with_growth(4, |_| Err(Error::os("EnumProcessModules", 5)));
        assert!(matches!(result, Err(Error::Os { code: 5, .. })));
    }
}

//! Module API Trait
//!
//! Narrow view of the operating system's module table.

use super::ModuleRecord;
use crate::Result;

/// Operations the inventory needs from the OS loader.
///
/// Every call works on the current process. Implementations report OS
/// failures as [`crate::Error::Os`] so callers can surface the code.
pub trait ModuleApi {
    /// Every module currently mapped, in loader order
    fn modules(&self) -> Result<Vec<ModuleRecord>>;

    /// Whether a module with this path is mapped. Never changes reference counts.
    fn is_loaded(&self, path: &str) -> bool;

    /// Map a module, returning its base address. The caller owns the new
    /// reference and is free to leak it.
    fn load(&self, path: &str) -> Result<u64>;

    /// Drop one reference to the module at `base_address`. Fails once the
    /// address no longer names a mapped module.
    fn release(&self, base_address: u64) -> Result<()>;
}

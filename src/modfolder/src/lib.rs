//! Shell namespace model of the modules loaded into the current process.
//!
//! The folder presents every mapped module (DLL or shared object) as an item
//! that can be sorted, inspected, revealed and unloaded, and accepts files
//! dropped onto it as modules to load.
//!
//! # Layout
//!
//! - [`idlist`], [`pidl`], [`cida`]: identifier lists and the folder's own item records
//! - [`inventory`]: the process module table behind a backend trait
//! - [`enumerator`]: restartable item sequences handed to the shell
//! - [`folder`]: the folder object and its roles
//! - [`refresh`]: load-event driven re-enumeration
//! - [`host`]: side effects requested from the surrounding shell
//! - [`registration`]: the registry tree that attaches the folder to the shell
//!
//! The COM server lives in `modfolder-shell`; this crate has no COM types and
//! is fully usable (and tested) on any platform.

pub mod cida;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod folder;
pub mod host;
pub mod idlist;
pub mod inventory;
pub mod logging;
pub mod pidl;
pub mod refresh;
pub mod registration;
#[cfg(windows)]
pub mod sys;
pub mod wide;

pub use config::Config;
pub use enumerator::{Batch, IdEnumerator};
pub use error::{Error, Result};
pub use folder::ModuleFolder;
pub use idlist::{IdList, IdListRef};
pub use inventory::{Inventory, ModuleApi, ModuleRecord};
pub use refresh::{RefreshSignal, RefreshTarget, RefreshWorker};

/// Class identifier of the folder
pub const CLASS_ID: &str = "{6B4E2E3B-3D6B-4D4E-9A1C-0F0C8D8E8F11}";

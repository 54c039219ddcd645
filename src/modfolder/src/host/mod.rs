//! Host shell services
//!
//! The few side effects the folder needs from the shell around it. Everything
//! here is fire-and-forget from the folder's point of view: failures are
//! logged by the implementation and never surface to the caller.

#[cfg(windows)]
pub mod windows;

#[cfg(windows)]
pub use self::windows::WindowsShell;

use crate::idlist::IdListRef;

/// Body of the dialog shown when a dropped module fails to load
pub fn load_failure_message(path: &str, code: u32) -> String {
    format!("LoadLibrary failed.\nPath: {}\nError: {}", path, code)
}

pub trait ShellHost {
    /// Tell the user a module failed to load (modal on the calling thread)
    fn report_load_failure(&self, path: &str, code: u32);

    /// Open the module's parent folder with the module selected
    fn reveal(&self, path: &str);

    /// Show the file properties dialog for the module
    fn show_properties(&self, path: &str);

    /// Filesystem path named by an absolute identifier list, if it has one
    fn resolve_id_list(&self, list: IdListRef<'_>) -> Option<String>;
}

#[cfg(test)]
pub mod recording {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Host double that records every request
    #[derive(Default)]
    pub struct RecordingHost {
        pub failures: RefCell<Vec<(String, u32)>>,
        pub revealed: RefCell<Vec<String>>,
        pub properties: RefCell<Vec<String>>,
        /// Identifier-list bytes to the path they resolve to
        pub paths: RefCell<HashMap<Vec<u8>, String>>,
    }

    impl RecordingHost {
        pub fn map_path(&self, list: IdListRef<'_>, path: &str) {
            self.paths
                .borrow_mut()
                .insert(list.as_bytes().to_vec(), path.to_string());
        }
    }

    impl ShellHost for RecordingHost {
        fn report_load_failure(&self, path: &str, code: u32) {
            self.failures.borrow_mut().push((path.to_string(), code));
        }

        fn reveal(&self, path: &str) {
            self.revealed.borrow_mut().push(path.to_string());
        }

        fn show_properties(&self, path: &str) {
            self.properties.borrow_mut().push(path.to_string());
        }

        fn resolve_id_list(&self, list: IdListRef<'_>) -> Option<String> {
            self.paths.borrow().get(list.as_bytes()).cloned()
        }
    }
}

//! Shell-backed host services

use std::ptr;

use tracing::{debug, warn};
use winapi::shared::minwindef::MAX_PATH;
use winapi::um::winuser::{MessageBoxW, MB_ICONERROR, MB_OK};

use super::{load_failure_message, ShellHost};
use crate::idlist::IdListRef;
use crate::sys::{
    ILCreateFromPathW, SHGetPathFromIDListW, SHObjectProperties, SHOpenFolderAndSelectItems,
    ShellPidl, SHOP_FILEPATH,
};
use crate::wide::{from_wide, to_wide};

/// Host services provided by the running shell. Dialogs are unowned.
#[derive(Debug, Clone)]
pub struct WindowsShell {
    title: String,
}

impl WindowsShell {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

impl ShellHost for WindowsShell {
    fn report_load_failure(&self, path: &str, code: u32) {
        let text = to_wide(&load_failure_message(path, code));
        let caption = to_wide(&self.title);
        unsafe {
            MessageBoxW(ptr::null_mut(), text.as_ptr(), caption.as_ptr(), MB_OK | MB_ICONERROR)
        };
    }

    fn reveal(&self, path: &str) {
        let wide = to_wide(path);
        let Some(pidl) = (unsafe { ShellPidl::from_raw(ILCreateFromPathW(wide.as_ptr())) }) else {
            warn!("No shell item for {}", path);
            return;
        };
        let hr = unsafe { SHOpenFolderAndSelectItems(pidl.as_ptr(), 0, ptr::null(), 0) };
        if hr < 0 {
            warn!("SHOpenFolderAndSelectItems failed for {}: {:#x}", path, hr);
        }
    }

    fn show_properties(&self, path: &str) {
        let wide = to_wide(path);
        let ok = unsafe { SHObjectProperties(ptr::null_mut(), SHOP_FILEPATH, wide.as_ptr(), ptr::null()) };
        if ok == 0 {
            warn!("SHObjectProperties failed for {}", path);
        }
    }

    fn resolve_id_list(&self, list: IdListRef<'_>) -> Option<String> {
        let mut buf = [0u16; MAX_PATH];
        let ok = unsafe { SHGetPathFromIDListW(list.as_bytes().as_ptr(), buf.as_mut_ptr()) };
        if ok == 0 {
            debug!("Identifier list has no filesystem path");
            return None;
        }
        Some(from_wide(&buf))
    }
}

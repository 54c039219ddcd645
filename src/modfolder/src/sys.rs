//! Shell32 entry points and constants missing from `winapi`'s feature set

#![allow(non_snake_case)]

use std::ffi::c_void;

use winapi::shared::minwindef::{BOOL, DWORD, UINT, ULONG};
use winapi::shared::ntdef::{HRESULT, LONG, LPCWSTR, LPWSTR};
use winapi::shared::windef::HWND;

pub const SHCNE_UPDATEDIR: LONG = 0x0000_1000;
pub const SHCNE_ASSOCCHANGED: LONG = 0x0800_0000;
pub const SHCNF_IDLIST: UINT = 0x0000;
pub const SHCNF_FLUSH: UINT = 0x1000;

pub const SHOP_FILEPATH: DWORD = 0x0000_0002;

/// Identifier list as handed across the shell ABI
pub type Pidl = *mut u8;
pub type PCPidl = *const u8;

#[link(name = "shell32")]
extern "system" {
    pub fn SHChangeNotify(wEventId: LONG, uFlags: UINT, dwItem1: *const c_void, dwItem2: *const c_void);
    pub fn SHParseDisplayName(
        pszName: LPCWSTR,
        pbc: *mut c_void,
        ppidl: *mut Pidl,
        sfgaoIn: ULONG,
        psfgaoOut: *mut ULONG,
    ) -> HRESULT;
    pub fn SHGetPathFromIDListW(pidl: PCPidl, pszPath: LPWSTR) -> BOOL;
    pub fn ILCreateFromPathW(pszPath: LPCWSTR) -> Pidl;
    pub fn ILFree(pidl: Pidl);
    pub fn SHOpenFolderAndSelectItems(
        pidlFolder: PCPidl,
        cidl: UINT,
        apidl: *const PCPidl,
        dwFlags: DWORD,
    ) -> HRESULT;
    pub fn SHObjectProperties(
        hwnd: HWND,
        shopObjectType: DWORD,
        pszObjectName: LPCWSTR,
        pszPropertyPage: LPCWSTR,
    ) -> BOOL;
}

/// Identifier list allocated by the shell, freed with `ILFree` on drop
pub struct ShellPidl(Pidl);

impl ShellPidl {
    /// Take ownership of a shell allocation; `None` for null
    ///
    /// # Safety
    ///
    /// `pidl` must have been allocated by the shell and not be freed elsewhere.
    pub unsafe fn from_raw(pidl: Pidl) -> Option<Self> {
        (!pidl.is_null()).then_some(Self(pidl))
    }

    pub fn as_ptr(&self) -> PCPidl {
        self.0
    }
}

impl Drop for ShellPidl {
    fn drop(&mut self) {
        unsafe { ILFree(self.0) };
    }
}

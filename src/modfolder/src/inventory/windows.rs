//! Windows loader backend (psapi / libloaderapi)

use std::mem;

use tracing::warn;
use winapi::shared::minwindef::{DWORD, HMODULE};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::{FreeLibrary, GetModuleFileNameW, GetModuleHandleW, LoadLibraryW};
use winapi::um::processthreadsapi::GetCurrentProcess;
use winapi::um::psapi::{EnumProcessModules, GetModuleInformation, MODULEINFO};

use super::{collect_with_growth, ModuleApi, ModuleRecord, INITIAL_MODULE_CAPACITY};
use crate::wide::{from_wide, to_wide};
use crate::{Error, Result};

/// Long-path limit for module file names
const MAX_MODULE_PATH: usize = 32_768;

/// The current process's module table
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsModules;

impl WindowsModules {
    fn handles(&self) -> Result<Vec<usize>> {
        collect_with_growth(INITIAL_MODULE_CAPACITY, |buf: &mut [usize]| {
            let mut needed: DWORD = 0;
            let ok = unsafe {
                EnumProcessModules(
                    GetCurrentProcess(),
                    buf.as_mut_ptr() as *mut HMODULE,
                    (buf.len() * mem::size_of::<HMODULE>()) as DWORD,
                    &mut needed,
                )
            };
            if ok == 0 {
                return Err(Error::os("EnumProcessModules", unsafe { GetLastError() }));
            }
            Ok(needed as usize / mem::size_of::<HMODULE>())
        })
    }

    fn file_name(handle: HMODULE) -> Result<String> {
        let mut buf = vec![0u16; MAX_MODULE_PATH];
        let len = unsafe { GetModuleFileNameW(handle, buf.as_mut_ptr(), buf.len() as DWORD) };
        if len == 0 {
            return Err(Error::os("GetModuleFileNameW", unsafe { GetLastError() }));
        }
        Ok(from_wide(&buf[..len as usize]))
    }

    fn record(handle: HMODULE) -> Result<ModuleRecord> {
        let path = Self::file_name(handle)?;

        let mut info: MODULEINFO = unsafe { mem::zeroed() };
        let ok = unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                handle,
                &mut info,
                mem::size_of::<MODULEINFO>() as DWORD,
            )
        };
        if ok == 0 {
            let code = unsafe { GetLastError() };
            warn!("GetModuleInformation failed for {} ({}), size unknown", path, code);
            return Ok(ModuleRecord::new(path, handle as u64, 0));
        }

        Ok(ModuleRecord::new(
            path,
            info.lpBaseOfDll as u64,
            info.SizeOfImage,
        ))
    }
}

impl ModuleApi for WindowsModules {
    fn modules(&self) -> Result<Vec<ModuleRecord>> {
        let mut modules = Vec::new();
        for handle in self.handles()? {
            match Self::record(handle as HMODULE) {
                Ok(record) => modules.push(record),
                Err(e) => warn!("Skipping module {:#x}: {}", handle, e),
            }
        }
        Ok(modules)
    }

    fn is_loaded(&self, path: &str) -> bool {
        let wide = to_wide(path);
        !unsafe { GetModuleHandleW(wide.as_ptr()) }.is_null()
    }

    fn load(&self, path: &str) -> Result<u64> {
        let wide = to_wide(path);
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            return Err(Error::os("LoadLibraryW", unsafe { GetLastError() }));
        }
        Ok(handle as u64)
    }

    fn release(&self, base_address: u64) -> Result<()> {
        if base_address == 0 {
            return Err(Error::InvalidArgument("null module handle"));
        }
        let ok = unsafe { FreeLibrary(base_address as usize as HMODULE) };
        if ok == 0 {
            return Err(Error::os("FreeLibrary", unsafe { GetLastError() }));
        }
        Ok(())
    }
}

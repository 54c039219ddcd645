//! Unix loader backend (`/proc/self/maps` and the dynamic linker)

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{BufRead, BufReader};

use tracing::{debug, trace};

use super::{ModuleApi, ModuleRecord};
use crate::{Error, Result};

const MAPS_PATH: &str = "/proc/self/maps";

/// One line of a maps file that is backed by a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub start: u64,
    pub end: u64,
    pub offset: u64,
    pub path: String,
}

/// Parse the file-backed mappings of a maps listing, skipping anonymous and
/// pseudo (`[heap]`, `[vdso]`) regions
pub fn parse_maps<R: BufRead>(reader: R) -> Result<Vec<Mapping>> {
    let mut mappings = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(range) = parts.first() else {
            continue;
        };

        let Some((start, end)) = range.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16))
        else {
            continue;
        };
        let offset = parts
            .get(2)
            .and_then(|s| u64::from_str_radix(s, 16).ok())
            .unwrap_or(0);

        // Paths may contain spaces; everything after the inode is the path
        if parts.len() < 6 {
            continue;
        }
        let path = parts[5..].join(" ");
        if !path.starts_with('/') {
            continue;
        }

        mappings.push(Mapping {
            start,
            end,
            offset,
            path,
        });
    }

    Ok(mappings)
}

/// Collapse mappings into one record per file, in order of first appearance.
/// The base is the lowest mapping of the file and the size spans to its
/// highest mapping.
pub fn group_modules(mappings: &[Mapping]) -> Vec<ModuleRecord> {
    let mut spans: Vec<(String, u64, u64)> = Vec::new();
    for mapping in mappings {
        match spans.iter_mut().find(|(path, _, _)| *path == mapping.path) {
            Some((_, start, end)) => {
                *start = (*start).min(mapping.start);
                *end = (*end).max(mapping.end);
            }
            None => spans.push((mapping.path.clone(), mapping.start, mapping.end)),
        }
    }

    spans
        .into_iter()
        .map(|(path, start, end)| {
            let size = u32::try_from(end - start).unwrap_or(u32::MAX);
            ModuleRecord::new(path, start, size)
        })
        .collect()
}

fn c_path(path: &str) -> Result<CString> {
    CString::new(path).map_err(|_| Error::InvalidArgument("path contains a NUL byte"))
}

fn last_dl_error() -> String {
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return "unknown error".to_string();
    }
    unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
}

/// Handle for an already-mapped library without mapping a new one
fn open_no_load(path: &CStr) -> Option<*mut libc::c_void> {
    let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_NOLOAD) };
    (!handle.is_null()).then_some(handle)
}

/// The current process's module table
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixModules;

impl ModuleApi for UnixModules {
    fn modules(&self) -> Result<Vec<ModuleRecord>> {
        let file = File::open(MAPS_PATH)?;
        let mappings = parse_maps(BufReader::new(file))?;
        trace!("{} file-backed mappings", mappings.len());
        Ok(group_modules(&mappings))
    }

    fn is_loaded(&self, path: &str) -> bool {
        let Ok(path) = c_path(path) else {
            return false;
        };
        match open_no_load(&path) {
            Some(handle) => {
                unsafe { libc::dlclose(handle) };
                true
            }
            None => false,
        }
    }

    fn load(&self, path: &str) -> Result<u64> {
        let c = c_path(path)?;
        let handle = unsafe { libc::dlopen(c.as_ptr(), libc::RTLD_NOW) };
        if handle.is_null() {
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            return Err(Error::os(format!("dlopen: {}", last_dl_error()), code as u32));
        }
        Ok(self
            .modules()?
            .into_iter()
            .find(|m| m.path == path)
            .map(|m| m.base_address)
            .unwrap_or(handle as u64))
    }

    fn release(&self, base_address: u64) -> Result<()> {
        let module = self
            .modules()?
            .into_iter()
            .find(|m| {
                base_address >= m.base_address
                    && base_address < m.base_address + u64::from(m.image_size)
            })
            .ok_or_else(|| Error::os("dladdr", libc::ENOENT as u32))?;

        let path = c_path(&module.path)?;
        let handle = open_no_load(&path).ok_or_else(|| {
            Error::os(format!("dlopen {}", module.path), libc::ENOENT as u32)
        })?;

        // First close balances the probe above, the second drops a real reference
        unsafe { libc::dlclose(handle) };
        if unsafe { libc::dlclose(handle) } != 0 {
            return Err(Error::os(format!("dlclose: {}", last_dl_error()), 0));
        }
        debug!("Dropped a reference to {}", module.path);
        Ok(())
    }
}

//! `DllRegisterServer` / `DllUnregisterServer`

use std::ptr;

use tracing::{info, warn};
use winapi::shared::minwindef::{DWORD, HKEY};
use winapi::shared::winerror::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
use winapi::um::winnt::{KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SZ};
use winapi::um::winreg::{
    RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegSetValueExW, HKEY_CURRENT_USER,
};

use modfolder::config::Config;
use modfolder::registration::{self, RegEntry, RegValue};
use modfolder::sys::{SHChangeNotify, SHCNE_ASSOCCHANGED, SHCNF_IDLIST};
use modfolder::wide::to_wide;
use modfolder::{Error, Result};

use crate::runtime;

/// Open key under `HKEY_CURRENT_USER`, closed on drop
struct Key(HKEY);

impl Key {
    fn create(path: &str) -> Result<Self> {
        let wide = to_wide(path);
        let mut key: HKEY = ptr::null_mut();
        let status = unsafe {
            RegCreateKeyExW(
                HKEY_CURRENT_USER,
                wide.as_ptr(),
                0,
                ptr::null_mut(),
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE,
                ptr::null_mut(),
                &mut key,
                ptr::null_mut(),
            )
        };
        if status != ERROR_SUCCESS as i32 {
            return Err(Error::os(format!("RegCreateKeyExW({})", path), status as u32));
        }
        Ok(Self(key))
    }

    fn set(&self, name: Option<&str>, value: &RegValue) -> Result<()> {
        let name = name.map(to_wide);
        let name_ptr = name.as_ref().map_or(ptr::null(), |n| n.as_ptr());

        let (kind, data): (DWORD, Vec<u8>) = match value {
            RegValue::String(s) => (
                REG_SZ,
                to_wide(s).iter().flat_map(|unit| unit.to_le_bytes()).collect(),
            ),
            RegValue::Dword(v) => (REG_DWORD, v.to_le_bytes().to_vec()),
        };
        let status = unsafe {
            RegSetValueExW(self.0, name_ptr, 0, kind, data.as_ptr(), data.len() as DWORD)
        };
        if status != ERROR_SUCCESS as i32 {
            return Err(Error::os("RegSetValueExW", status as u32));
        }
        Ok(())
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        unsafe { RegCloseKey(self.0) };
    }
}

fn write(entry: &RegEntry) -> Result<()> {
    let key = Key::create(&entry.key)?;
    if let Some(value) = &entry.value {
        key.set(entry.name, value)?;
    }
    Ok(())
}

fn associations_changed() {
    unsafe { SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST, ptr::null(), ptr::null()) };
}

fn load_config() -> Config {
    let config = Config::load().unwrap_or_default();
    let _ = modfolder::logging::init_from_config(&config);
    config
}

pub fn register() -> Result<()> {
    let config = load_config();
    let server = runtime::module_path()?;

    for entry in registration::entries(&server, &config.display_name) {
        if let Err(e) = write(&entry) {
            warn!("Registration failed at {}: {}", entry.key, e);
            return Err(e);
        }
    }
    associations_changed();
    info!("Registered {} from {}", modfolder::CLASS_ID, server);
    Ok(())
}

pub fn unregister() -> Result<()> {
    load_config();
    let mut result = Ok(());
    for key in registration::owned_keys() {
        let wide = to_wide(&key);
        let status = unsafe { RegDeleteTreeW(HKEY_CURRENT_USER, wide.as_ptr()) };
        if status != ERROR_SUCCESS as i32 && status != ERROR_FILE_NOT_FOUND as i32 {
            warn!("Could not remove {}: {}", key, status);
            result = Err(Error::os(format!("RegDeleteTreeW({})", key), status as u32));
        }
    }
    associations_changed();
    info!("Unregistered {}", modfolder::CLASS_ID);
    result
}

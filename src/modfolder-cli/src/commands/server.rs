//! Shell server registration
//!
//! Loads the server DLL into this process and calls its own registration
//! entry point, so the registry tree is always the one the DLL describes.

use std::path::Path;

use anyhow::Result;

#[cfg(windows)]
fn call_entry_point(dll: &Path, entry_point: &str) -> Result<()> {
    use anyhow::{bail, Context};
    use modfolder::wide::to_wide;
    use std::ffi::CString;
    use winapi::um::libloaderapi::{FreeLibrary, GetProcAddress, LoadLibraryW};

    type EntryPoint = unsafe extern "system" fn() -> i32;

    let path = dll
        .canonicalize()
        .with_context(|| format!("Server DLL not found: {}", dll.display()))?;
    let wide = to_wide(&path.display().to_string());
    let module = unsafe { LoadLibraryW(wide.as_ptr()) };
    if module.is_null() {
        bail!(
            "Failed to load {}: {}",
            path.display(),
            std::io::Error::last_os_error()
        );
    }

    let name = CString::new(entry_point)?;
    let proc = unsafe { GetProcAddress(module, name.as_ptr()) };
    let result = if proc.is_null() {
        Err(anyhow::anyhow!("{} does not export {}", path.display(), entry_point))
    } else {
        let entry: EntryPoint = unsafe { std::mem::transmute(proc) };
        let hr = unsafe { entry() };
        if hr < 0 {
            Err(anyhow::anyhow!("{} failed: {:#010x}", entry_point, hr))
        } else {
            Ok(())
        }
    };
    unsafe { FreeLibrary(module) };
    result
}

#[cfg(not(windows))]
fn call_entry_point(dll: &Path, entry_point: &str) -> Result<()> {
    anyhow::bail!(
        "{} of {} needs Windows; the shell server only runs there",
        entry_point,
        dll.display()
    )
}

pub fn register(dll: &Path) -> Result<()> {
    call_entry_point(dll, "DllRegisterServer")?;
    println!("Registered {} ({})", dll.display(), modfolder::CLASS_ID);
    Ok(())
}

pub fn unregister(dll: &Path) -> Result<()> {
    call_entry_point(dll, "DllUnregisterServer")?;
    println!("Unregistered {}", dll.display());
    Ok(())
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn test_register_needs_windows() {
        let err = register(Path::new("modfolder_shell.dll")).unwrap_err();
        assert!(err.to_string().contains("DllRegisterServer"));
    }
}

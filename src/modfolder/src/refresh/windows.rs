//! Loader notification hook and shell change notifier

use std::ffi::c_void;
use std::ptr;

use tracing::{debug, info, warn};
use winapi::shared::minwindef::ULONG;
use winapi::shared::ntdef::{NTSTATUS, UNICODE_STRING};
use winapi::shared::winerror::ERROR_PROC_NOT_FOUND;
use winapi::um::combaseapi::{CoInitializeEx, CoUninitialize};
use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress};
use winapi::um::objbase::COINIT_APARTMENTTHREADED;

use super::{ChangeNotifier, LoaderEvent, RefreshSignal, RefreshTarget};
use crate::sys::{SHChangeNotify, SHParseDisplayName, ShellPidl, SHCNE_UPDATEDIR, SHCNF_IDLIST};
use crate::wide::to_wide;
use crate::{Error, Result};

const LDR_DLL_NOTIFICATION_REASON_LOADED: ULONG = 1;
const LDR_DLL_NOTIFICATION_REASON_UNLOADED: ULONG = 2;

/// Shared layout of the loaded and unloaded notification payloads
#[repr(C)]
#[allow(dead_code)]
struct LdrDllNotificationData {
    flags: ULONG,
    full_dll_name: *const UNICODE_STRING,
    base_dll_name: *const UNICODE_STRING,
    dll_base: *mut c_void,
    size_of_image: ULONG,
}

type NotificationFn =
    unsafe extern "system" fn(reason: ULONG, data: *const LdrDllNotificationData, context: *mut c_void);
type RegisterFn = unsafe extern "system" fn(
    flags: ULONG,
    callback: NotificationFn,
    context: *mut c_void,
    cookie: *mut *mut c_void,
) -> NTSTATUS;
type UnregisterFn = unsafe extern "system" fn(cookie: *mut c_void) -> NTSTATUS;

struct HookContext {
    signal: RefreshSignal,
}

unsafe extern "system" fn on_notification(
    reason: ULONG,
    data: *const LdrDllNotificationData,
    context: *mut c_void,
) {
    let Some(ctx) = (context as *const HookContext).as_ref() else {
        return;
    };
    // Loader lock held: no allocation or logging beyond the post
    let base = data.as_ref().map_or(0, |d| d.dll_base as u64);
    let event = match reason {
        LDR_DLL_NOTIFICATION_REASON_LOADED => LoaderEvent::Loaded { base },
        LDR_DLL_NOTIFICATION_REASON_UNLOADED => LoaderEvent::Unloaded { base },
        _ => return,
    };
    ctx.signal.on_loader_event(event);
}

unsafe fn ntdll_export(name: &[u8]) -> Result<*const c_void> {
    let ntdll = to_wide("ntdll.dll");
    let module = GetModuleHandleW(ntdll.as_ptr());
    if module.is_null() {
        return Err(Error::os("GetModuleHandleW(ntdll)", ERROR_PROC_NOT_FOUND));
    }
    let proc = GetProcAddress(module, name.as_ptr() as *const i8);
    if proc.is_null() {
        return Err(Error::os("GetProcAddress", ERROR_PROC_NOT_FOUND));
    }
    Ok(proc as *const c_void)
}

/// Process-wide loader notification registration; unregisters on drop
pub struct LoaderHook {
    cookie: *mut c_void,
    context: *mut HookContext,
    unregister: UnregisterFn,
}

impl LoaderHook {
    /// Register for load and unload events, posting each one to `signal`
    pub fn register(signal: RefreshSignal) -> Result<Self> {
        let (register, unregister): (RegisterFn, UnregisterFn) = unsafe {
            (
                std::mem::transmute(ntdll_export(b"LdrRegisterDllNotification\0")?),
                std::mem::transmute(ntdll_export(b"LdrUnregisterDllNotification\0")?),
            )
        };

        let context = Box::into_raw(Box::new(HookContext { signal }));
        let mut cookie = ptr::null_mut();
        let status = unsafe { register(0, on_notification, context as *mut c_void, &mut cookie) };
        if status < 0 {
            drop(unsafe { Box::from_raw(context) });
            return Err(Error::os("LdrRegisterDllNotification", status as u32));
        }

        info!("Loader notifications registered");
        Ok(Self {
            cookie,
            context,
            unregister,
        })
    }
}

impl Drop for LoaderHook {
    fn drop(&mut self) {
        let status = unsafe { (self.unregister)(self.cookie) };
        if status < 0 {
            // Still registered, so the context must outlive us
            warn!("LdrUnregisterDllNotification failed: {:#x}", status);
            return;
        }
        drop(unsafe { Box::from_raw(self.context) });
        debug!("Loader notifications unregistered");
    }
}

// The cookie and context are only touched at registration and drop
unsafe impl Send for LoaderHook {}
unsafe impl Sync for LoaderHook {}

/// Broadcasts `SHCNE_UPDATEDIR` for the target folder
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellNotifier;

impl ShellNotifier {
    fn notify_pidl(pidl: *const u8) {
        unsafe {
            SHChangeNotify(
                SHCNE_UPDATEDIR,
                SHCNF_IDLIST,
                pidl as *const c_void,
                ptr::null(),
            )
        };
    }
}

impl ChangeNotifier for ShellNotifier {
    fn notify(&self, target: &RefreshTarget) -> Result<()> {
        let hr = unsafe { CoInitializeEx(ptr::null_mut(), COINIT_APARTMENTTHREADED) };
        let result = match target {
            RefreshTarget::ParsingName(name) => {
                let wide = to_wide(name);
                let mut raw = ptr::null_mut();
                let parsed = unsafe {
                    SHParseDisplayName(wide.as_ptr(), ptr::null_mut(), &mut raw, 0, ptr::null_mut())
                };
                match unsafe { ShellPidl::from_raw(raw) } {
                    Some(pidl) if parsed >= 0 => {
                        Self::notify_pidl(pidl.as_ptr());
                        Ok(())
                    }
                    _ => Err(Error::os(format!("SHParseDisplayName({})", name), parsed as u32)),
                }
            }
            RefreshTarget::IdList(list) => {
                Self::notify_pidl(list.as_bytes().as_ptr());
                Ok(())
            }
        };
        if hr >= 0 {
            unsafe { CoUninitialize() };
        }
        result
    }
}

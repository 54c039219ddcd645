//! In-process COM server exposing the module folder to Explorer
//!
//! The DLL exports the four standard server entry points. Everything that
//! decides what the folder shows or does lives in the `modfolder` crate;
//! this crate only adapts it to the shell's COM interfaces.

#![cfg(windows)]
#![allow(non_snake_case)]

mod com;
mod context_menu;
mod data_object;
mod enum_ids;
mod factory;
mod ffi;
mod folder;
mod register;
mod runtime;

use std::ffi::c_void;
use std::ptr;

use winapi::shared::guiddef::{REFCLSID, REFIID};
use winapi::shared::minwindef::{BOOL, DWORD, HINSTANCE, LPVOID, TRUE};
use winapi::shared::ntdef::HRESULT;
use winapi::um::libloaderapi::DisableThreadLibraryCalls;
use winapi::um::winnt::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

use crate::com::{CLASS_E_CLASSNOTAVAILABLE, CLSID_MODULE_FOLDER, E_POINTER, S_FALSE, S_OK};

#[no_mangle]
pub extern "system" fn DllMain(instance: HINSTANCE, reason: DWORD, reserved: LPVOID) -> BOOL {
    match reason {
        DLL_PROCESS_ATTACH => {
            runtime::set_module(instance);
            unsafe { DisableThreadLibraryCalls(instance) };
        }
        // Leave everything in place when the whole process is exiting
        DLL_PROCESS_DETACH if reserved.is_null() => runtime::shutdown(),
        _ => {}
    }
    TRUE
}

#[no_mangle]
pub unsafe extern "system" fn DllGetClassObject(
    clsid: REFCLSID,
    iid: REFIID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    com::guarded("DllGetClassObject", || {
        if ppv.is_null() {
            return E_POINTER;
        }
        *ppv = ptr::null_mut();
        if clsid.is_null() || !com::guid_eq(&*clsid, &CLSID_MODULE_FOLDER) {
            return CLASS_E_CLASSNOTAVAILABLE;
        }
        runtime::get();
        factory::create(iid, ppv)
    })
}

#[no_mangle]
pub extern "system" fn DllCanUnloadNow() -> HRESULT {
    com::guarded("DllCanUnloadNow", || {
        if runtime::in_use() {
            return S_FALSE;
        }
        runtime::stop_refresh();
        S_OK
    })
}

#[no_mangle]
pub extern "system" fn DllRegisterServer() -> HRESULT {
    com::guarded("DllRegisterServer", || com::to_hresult(register::register()))
}

#[no_mangle]
pub extern "system" fn DllUnregisterServer() -> HRESULT {
    com::guarded("DllUnregisterServer", || com::to_hresult(register::unregister()))
}

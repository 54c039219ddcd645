//! Class factory for the folder

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::AtomicU32;

use tracing::debug;
use winapi::shared::guiddef::{GUID, REFIID};
use winapi::shared::minwindef::BOOL;
use winapi::shared::ntdef::HRESULT;

use crate::com::{
    self, guid_eq, unknown_thunks, ComObject, IUnknownVtbl, CLASS_E_NOAGGREGATION, E_POINTER,
    IID_ICLASSFACTORY, IID_IUNKNOWN, S_OK,
};
use crate::ffi::IClassFactoryVtbl;
use crate::runtime;

#[repr(C)]
struct ClassFactory {
    vtbl: *const IClassFactoryVtbl,
    refs: AtomicU32,
}

unsafe impl ComObject for ClassFactory {
    fn refs(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface(&self, iid: &GUID) -> *mut c_void {
        if guid_eq(iid, &IID_IUNKNOWN) || guid_eq(iid, &IID_ICLASSFACTORY) {
            &self.vtbl as *const _ as *mut c_void
        } else {
            ptr::null_mut()
        }
    }
}

unknown_thunks!(ClassFactory, vtbl, query_interface, add_ref, release);

unsafe extern "system" fn create_instance(
    _this: *mut c_void,
    outer: *mut c_void,
    iid: REFIID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    com::guarded("CreateInstance", || {
        if ppv.is_null() {
            return E_POINTER;
        }
        *ppv = ptr::null_mut();
        if !outer.is_null() {
            return CLASS_E_NOAGGREGATION;
        }
        if let Some(iid) = iid.as_ref() {
            debug!("CreateInstance for {}", com::iid_name(iid));
        }
        crate::folder::create(iid, ppv)
    })
}

unsafe extern "system" fn lock_server(_this: *mut c_void, lock: BOOL) -> HRESULT {
    runtime::lock_server(lock != 0);
    S_OK
}

static VTBL: IClassFactoryVtbl = IClassFactoryVtbl {
    unknown: IUnknownVtbl {
        query_interface,
        add_ref,
        release,
    },
    create_instance,
    lock_server,
};

/// New factory, handed out as `iid`
pub unsafe fn create(iid: REFIID, ppv: *mut *mut c_void) -> HRESULT {
    let factory = com::into_raw(ClassFactory {
        vtbl: &VTBL,
        refs: AtomicU32::new(1),
    });
    com::query_new(factory, iid, ppv)
}

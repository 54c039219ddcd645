//! `IEnumIDList` over a snapshot of the folder's items

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::AtomicU32;

use tracing::warn;
use winapi::shared::guiddef::GUID;
use winapi::shared::minwindef::ULONG;
use winapi::shared::ntdef::HRESULT;

use modfolder::{Error, IdEnumerator};

use crate::com::{
    self, guid_eq, unknown_thunks, ComObject, IUnknownVtbl, E_INVALIDARG, E_OUTOFMEMORY,
    E_POINTER, IID_IENUMIDLIST, IID_IUNKNOWN, S_FALSE, S_OK,
};
use crate::ffi::{IEnumIDListVtbl, Pidl};

#[repr(C)]
struct EnumIdList {
    vtbl: *const IEnumIDListVtbl,
    refs: AtomicU32,
    items: RefCell<IdEnumerator>,
}

unsafe impl ComObject for EnumIdList {
    fn refs(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface(&self, iid: &GUID) -> *mut c_void {
        if guid_eq(iid, &IID_IUNKNOWN) || guid_eq(iid, &IID_IENUMIDLIST) {
            &self.vtbl as *const _ as *mut c_void
        } else {
            ptr::null_mut()
        }
    }
}

unknown_thunks!(EnumIdList, vtbl, query_interface, add_ref, release);

unsafe fn from_this<'a>(this: *mut c_void) -> &'a EnumIdList {
    &*com::object_of!(this, EnumIdList, vtbl)
}

unsafe extern "system" fn next(
    this: *mut c_void,
    requested: ULONG,
    out: *mut Pidl,
    fetched: *mut ULONG,
) -> HRESULT {
    com::guarded("IEnumIDList::Next", || {
        if out.is_null() {
            return E_POINTER;
        }
        if requested > 1 && fetched.is_null() {
            return E_INVALIDARG;
        }

        let mut items = from_this(this).items.borrow_mut();
        let available = items.remaining();
        let batch = items.next_with(requested as usize, |item| {
            let copy = com::alloc_id_list(item);
            if copy.is_null() {
                Err(Error::OutOfMemory(item.as_bytes().len()))
            } else {
                Ok(copy)
            }
        });
        for (i, copy) in batch.items.iter().enumerate() {
            *out.add(i) = *copy;
        }

        if !fetched.is_null() {
            *fetched = batch.len() as ULONG;
        }
        if batch.is_empty() && requested > 0 && available > 0 {
            warn!("Out of task memory with {} items left", available);
            E_OUTOFMEMORY
        } else if batch.exhausted {
            S_FALSE
        } else {
            S_OK
        }
    })
}

unsafe extern "system" fn skip(this: *mut c_void, count: ULONG) -> HRESULT {
    if from_this(this).items.borrow_mut().advance(count as usize) {
        S_OK
    } else {
        S_FALSE
    }
}

unsafe extern "system" fn reset(this: *mut c_void) -> HRESULT {
    from_this(this).items.borrow_mut().reset();
    S_OK
}

unsafe extern "system" fn clone(this: *mut c_void, out: *mut *mut c_void) -> HRESULT {
    com::guarded("IEnumIDList::Clone", || {
        if out.is_null() {
            return E_POINTER;
        }
        *out = ptr::null_mut();
        let copy = from_this(this).items.borrow().try_clone();
        match copy {
            Ok(items) => create(items, out),
            Err(e) => e.hresult(),
        }
    })
}

static VTBL: IEnumIDListVtbl = IEnumIDListVtbl {
    unknown: IUnknownVtbl {
        query_interface,
        add_ref,
        release,
    },
    next,
    skip,
    reset,
    clone,
};

/// Hand `items` to the shell as an `IEnumIDList`
pub unsafe fn create(items: IdEnumerator, out: *mut *mut c_void) -> HRESULT {
    let object = com::into_raw(EnumIdList {
        vtbl: &VTBL,
        refs: AtomicU32::new(1),
        items: RefCell::new(items),
    });
    com::query_new(object, &IID_IENUMIDLIST, out)
}

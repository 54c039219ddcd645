//! Minimal COM plumbing: GUIDs, `IUnknown`, reference counting and
//! shell-owned allocations

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{error, trace};
use winapi::shared::guiddef::GUID;
use winapi::shared::minwindef::ULONG;
use winapi::shared::ntdef::HRESULT;
use winapi::um::combaseapi::CoTaskMemAlloc;

use modfolder::error::hresult;
use modfolder::IdList;

pub use modfolder::error::hresult::{
    E_FAIL, E_INVALIDARG, E_NOINTERFACE, E_NOTIMPL, E_OUTOFMEMORY, E_POINTER, S_FALSE, S_OK,
};

pub const E_UNEXPECTED: HRESULT = 0x8000_FFFF_u32 as HRESULT;
pub const CLASS_E_CLASSNOTAVAILABLE: HRESULT = 0x8004_0111_u32 as HRESULT;
pub const CLASS_E_NOAGGREGATION: HRESULT = 0x8004_0110_u32 as HRESULT;

pub const fn guid(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> GUID {
    GUID {
        Data1: d1,
        Data2: d2,
        Data3: d3,
        Data4: d4,
    }
}

const fn shell_iid(d1: u32) -> GUID {
    guid(d1, 0, 0, [0xC0, 0, 0, 0, 0, 0, 0, 0x46])
}

pub const CLSID_MODULE_FOLDER: GUID = guid(
    0x6B4E_2E3B,
    0x3D6B,
    0x4D4E,
    [0x9A, 0x1C, 0x0F, 0x0C, 0x8D, 0x8E, 0x8F, 0x11],
);

pub const IID_IUNKNOWN: GUID = shell_iid(0x0000_0000);
pub const IID_ICLASSFACTORY: GUID = shell_iid(0x0000_0001);
pub const IID_IPERSIST: GUID = shell_iid(0x0000_010C);
pub const IID_IDATAOBJECT: GUID = shell_iid(0x0000_010E);
pub const IID_IDROPTARGET: GUID = shell_iid(0x0000_0122);
pub const IID_ISHELLVIEW: GUID = shell_iid(0x0002_14E3);
pub const IID_ICONTEXTMENU: GUID = shell_iid(0x0002_14E4);
pub const IID_ISHELLFOLDER: GUID = shell_iid(0x0002_14E6);
pub const IID_IPERSISTFOLDER: GUID = shell_iid(0x0002_14EA);
pub const IID_IENUMIDLIST: GUID = shell_iid(0x0002_14F2);
pub const IID_ICONTEXTMENU2: GUID = shell_iid(0x0002_14F4);
pub const IID_ISHELLFOLDER2: GUID = guid(
    0x93F2_F68C,
    0x1D1B,
    0x11D3,
    [0xA3, 0x0E, 0x00, 0xC0, 0x4F, 0x79, 0xAB, 0xD1],
);
pub const IID_IPERSISTFOLDER2: GUID = guid(
    0x1AC3_D9F0,
    0x175C,
    0x11D1,
    [0x95, 0xBE, 0x00, 0x60, 0x97, 0x97, 0xEA, 0x4F],
);
pub const IID_ISHELLFOLDERVIEWCB: GUID = guid(
    0x2047_E320,
    0xF2A9,
    0x11CE,
    [0xAE, 0x65, 0x08, 0x00, 0x2B, 0x2E, 0x12, 0x62],
);
pub const IID_ICONTEXTMENU3: GUID = guid(
    0xBCFC_E0A0,
    0xEC17,
    0x11D0,
    [0x8D, 0x10, 0x00, 0xA0, 0xC9, 0x0F, 0x27, 0x19],
);

pub fn guid_eq(a: &GUID, b: &GUID) -> bool {
    a.Data1 == b.Data1 && a.Data2 == b.Data2 && a.Data3 == b.Data3 && a.Data4 == b.Data4
}

/// Registry form, `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`
pub fn format_guid(g: &GUID) -> String {
    format!(
        "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
        g.Data1,
        g.Data2,
        g.Data3,
        g.Data4[0],
        g.Data4[1],
        g.Data4[2],
        g.Data4[3],
        g.Data4[4],
        g.Data4[5],
        g.Data4[6],
        g.Data4[7]
    )
}

/// Readable name of a well-known interface for logs
pub fn iid_name(iid: &GUID) -> String {
    const NAMES: &[(&GUID, &str)] = &[
        (&IID_IUNKNOWN, "IUnknown"),
        (&IID_ICLASSFACTORY, "IClassFactory"),
        (&IID_IPERSIST, "IPersist"),
        (&IID_IDATAOBJECT, "IDataObject"),
        (&IID_IDROPTARGET, "IDropTarget"),
        (&IID_ISHELLVIEW, "IShellView"),
        (&IID_ICONTEXTMENU, "IContextMenu"),
        (&IID_ICONTEXTMENU2, "IContextMenu2"),
        (&IID_ICONTEXTMENU3, "IContextMenu3"),
        (&IID_ISHELLFOLDER, "IShellFolder"),
        (&IID_ISHELLFOLDER2, "IShellFolder2"),
        (&IID_IPERSISTFOLDER, "IPersistFolder"),
        (&IID_IPERSISTFOLDER2, "IPersistFolder2"),
        (&IID_IENUMIDLIST, "IEnumIDList"),
        (&IID_ISHELLFOLDERVIEWCB, "IShellFolderViewCB"),
    ];
    NAMES
        .iter()
        .find(|(known, _)| guid_eq(known, iid))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format_guid(iid))
}

pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: *mut c_void, iid: *const GUID, ppv: *mut *mut c_void) -> HRESULT;
pub type RefCountFn = unsafe extern "system" fn(this: *mut c_void) -> ULONG;

#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface: QueryInterfaceFn,
    pub add_ref: RefCountFn,
    pub release: RefCountFn,
}

/// Call `Release` on an interface pointer we were handed
pub unsafe fn release_raw(unknown: *mut c_void) {
    if unknown.is_null() {
        return;
    }
    let vtbl = *(unknown as *const *const IUnknownVtbl);
    ((*vtbl).release)(unknown);
}

pub unsafe fn add_ref_raw(unknown: *mut c_void) {
    if unknown.is_null() {
        return;
    }
    let vtbl = *(unknown as *const *const IUnknownVtbl);
    ((*vtbl).add_ref)(unknown);
}

/// A heap object reachable through one or more vtable pointers.
///
/// # Safety
///
/// Implementors must be allocated with [`into_raw`] and only freed through
/// [`release`].
pub unsafe trait ComObject: Sized {
    fn refs(&self) -> &AtomicU32;

    /// Interface pointer for `iid` into this object, or null
    fn interface(&self, iid: &GUID) -> *mut c_void;
}

/// Move a new object (holding one reference) to the heap
pub fn into_raw<T: ComObject>(object: T) -> *mut T {
    crate::runtime::object_created();
    Box::into_raw(Box::new(object))
}

pub unsafe fn add_ref<T: ComObject>(object: *const T) -> ULONG {
    (*object).refs().fetch_add(1, Ordering::Relaxed) + 1
}

pub unsafe fn release<T: ComObject>(object: *mut T) -> ULONG {
    let remaining = (*object).refs().fetch_sub(1, Ordering::AcqRel) - 1;
    if remaining == 0 {
        drop(Box::from_raw(object));
        crate::runtime::object_destroyed();
    }
    remaining
}

pub unsafe fn query<T: ComObject>(
    object: *const T,
    iid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return E_POINTER;
    }
    *ppv = ptr::null_mut();
    if iid.is_null() {
        return E_INVALIDARG;
    }
    let interface = (*object).interface(&*iid);
    if interface.is_null() {
        trace!("QueryInterface {} refused", iid_name(&*iid));
        return E_NOINTERFACE;
    }
    add_ref(object);
    *ppv = interface;
    S_OK
}

/// Hand out the requested interface of a freshly created object and drop the
/// creation reference
pub unsafe fn query_new<T: ComObject>(object: *mut T, iid: *const GUID, ppv: *mut *mut c_void) -> HRESULT {
    let hr = query(object, iid, ppv);
    release(object);
    hr
}

/// Object pointer from a pointer to one of its vtable fields
macro_rules! object_of {
    ($this:expr, $ty:ty, $field:ident) => {
        ($this as *mut u8).sub(std::mem::offset_of!($ty, $field)) as *mut $ty
    };
}
pub(crate) use object_of;

/// `IUnknown` entry points for one vtable field of a [`ComObject`]
macro_rules! unknown_thunks {
    ($ty:ty, $field:ident, $qi:ident, $add_ref:ident, $release:ident) => {
        unsafe extern "system" fn $qi(
            this: *mut std::ffi::c_void,
            iid: *const winapi::shared::guiddef::GUID,
            ppv: *mut *mut std::ffi::c_void,
        ) -> winapi::shared::ntdef::HRESULT {
            $crate::com::query($crate::com::object_of!(this, $ty, $field), iid, ppv)
        }

        unsafe extern "system" fn $add_ref(this: *mut std::ffi::c_void) -> u32 {
            $crate::com::add_ref($crate::com::object_of!(this, $ty, $field))
        }

        unsafe extern "system" fn $release(this: *mut std::ffi::c_void) -> u32 {
            $crate::com::release($crate::com::object_of!(this, $ty, $field))
        }
    };
}
pub(crate) use unknown_thunks;

/// Run an entry point body, turning a panic into `E_UNEXPECTED`
pub fn guarded<F: FnOnce() -> HRESULT>(entry: &str, body: F) -> HRESULT {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(hr) => hr,
        Err(_) => {
            error!("{} panicked", entry);
            E_UNEXPECTED
        }
    }
}

/// Result code for a core result
pub fn to_hresult(result: modfolder::Result<()>) -> HRESULT {
    match result {
        Ok(()) => S_OK,
        Err(e) => e.hresult(),
    }
}

/// Copy an identifier list into task memory the shell will free
pub fn alloc_id_list(list: &IdList) -> *mut u8 {
    let bytes = list.as_bytes();
    let mem = unsafe { CoTaskMemAlloc(bytes.len()) } as *mut u8;
    if !mem.is_null() {
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), mem, bytes.len()) };
    }
    mem
}

/// Copy a string into task memory as a NUL-terminated wide string
pub fn alloc_wide(s: &str) -> *mut u16 {
    let wide = modfolder::wide::to_wide(s);
    let size = wide.len() * std::mem::size_of::<u16>();
    let mem = unsafe { CoTaskMemAlloc(size) } as *mut u16;
    if !mem.is_null() {
        unsafe { ptr::copy_nonoverlapping(wide.as_ptr(), mem, wide.len()) };
    }
    mem
}

/// Success code for a count, as `MAKE_HRESULT(SEVERITY_SUCCESS, 0, n)`
pub fn success_count(count: u32) -> HRESULT {
    hresult::success_code(count as u16)
}

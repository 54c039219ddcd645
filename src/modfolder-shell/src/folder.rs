//! The folder as a COM object
//!
//! One heap object answers `IShellFolder2`, `IPersistFolder2`,
//! `IShellFolderViewCB` and `IDropTarget`, with one vtable pointer per
//! interface and a shared reference count. Every method unpacks its raw
//! arguments and forwards to [`ShellFolder`].

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::AtomicU32;

use tracing::{debug, warn};
use winapi::shared::guiddef::{GUID, REFIID};
use winapi::shared::minwindef::{DWORD, LPARAM, UINT, ULONG, WPARAM};
use winapi::shared::ntdef::{HRESULT, LPCWSTR};
use winapi::shared::windef::{HWND, POINTL};

use modfolder::folder::compare::ordering_code;
use modfolder::folder::{Attributes, DropEffect, EnumFlags, NameFlags, UiObject, UiRequest};
use modfolder::IdListRef;

use crate::com::{
    self, guid_eq, unknown_thunks, ComObject, IUnknownVtbl, E_INVALIDARG, E_NOINTERFACE,
    E_OUTOFMEMORY, E_POINTER, IID_ICONTEXTMENU, IID_IDROPTARGET, IID_IPERSIST, IID_IPERSISTFOLDER, IID_IPERSISTFOLDER2, IID_ISHELLFOLDER,
    IID_ISHELLFOLDER2, IID_ISHELLFOLDERVIEWCB, IID_ISHELLVIEW, IID_IUNKNOWN, S_FALSE, S_OK,
};
use crate::data_object::DataObject;
use crate::ffi::{
    IDropTargetVtbl, IPersistFolder2Vtbl, IShellFolder2Vtbl, IShellFolderViewCBVtbl, PCPidl, Pidl,
    SHCreateShellFolderView, SfvCreate, ShColumnId, ShellDetails, StrRet, STRRET_WSTR,
};
use crate::runtime::{self, ShellFolder};

#[repr(C)]
pub struct FolderObject {
    shell_folder: *const IShellFolder2Vtbl,
    persist: *const IPersistFolder2Vtbl,
    view_callback: *const IShellFolderViewCBVtbl,
    drop_target: *const IDropTargetVtbl,
    refs: AtomicU32,
    folder: ShellFolder,
}

unsafe impl ComObject for FolderObject {
    fn refs(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface(&self, iid: &GUID) -> *mut c_void {
        let field: *const c_void = if guid_eq(iid, &IID_IUNKNOWN)
            || guid_eq(iid, &IID_ISHELLFOLDER)
            || guid_eq(iid, &IID_ISHELLFOLDER2)
        {
            &self.shell_folder as *const _ as *const c_void
        } else if guid_eq(iid, &IID_IPERSIST)
            || guid_eq(iid, &IID_IPERSISTFOLDER)
            || guid_eq(iid, &IID_IPERSISTFOLDER2)
        {
            &self.persist as *const _ as *const c_void
        } else if guid_eq(iid, &IID_ISHELLFOLDERVIEWCB) {
            &self.view_callback as *const _ as *const c_void
        } else if guid_eq(iid, &IID_IDROPTARGET) {
            &self.drop_target as *const _ as *const c_void
        } else {
            ptr::null()
        };
        field as *mut c_void
    }
}

impl FolderObject {
    pub fn folder(&self) -> &ShellFolder {
        &self.folder
    }

    fn shell_folder_ptr(&self) -> *mut c_void {
        &self.shell_folder as *const _ as *mut c_void
    }

    fn view_callback_ptr(&self) -> *mut c_void {
        &self.view_callback as *const _ as *mut c_void
    }
}

/// New folder, handed out as `iid`
pub unsafe fn create(iid: REFIID, ppv: *mut *mut c_void) -> HRESULT {
    let object = com::into_raw(FolderObject {
        shell_folder: &SHELL_FOLDER_VTBL,
        persist: &PERSIST_VTBL,
        view_callback: &VIEW_CALLBACK_VTBL,
        drop_target: &DROP_TARGET_VTBL,
        refs: AtomicU32::new(1),
        folder: runtime::get().folder(),
    });
    com::query_new(object, iid, ppv)
}

unsafe fn null_out<T>(out: *mut *mut T) {
    if !out.is_null() {
        *out = ptr::null_mut();
    }
}

/// Selected items as views; `None` when the array or an entry is missing
unsafe fn item_views<'a>(count: UINT, items: *const PCPidl) -> Option<Vec<IdListRef<'a>>> {
    if count == 0 {
        return Some(Vec::new());
    }
    if items.is_null() {
        return None;
    }
    std::slice::from_raw_parts(items, count as usize)
        .iter()
        .map(|item| IdListRef::from_raw(*item))
        .collect()
}

unsafe fn set_strret(out: *mut StrRet, text: &str) -> HRESULT {
    let wide = com::alloc_wide(text);
    if wide.is_null() {
        return E_OUTOFMEMORY;
    }
    (*out).kind = STRRET_WSTR;
    (*out).data.ole_str = wide;
    S_OK
}

// IShellFolder2

unknown_thunks!(FolderObject, shell_folder, sf_query_interface, sf_add_ref, sf_release);

unsafe fn from_shell_folder<'a>(this: *mut c_void) -> &'a FolderObject {
    &*com::object_of!(this, FolderObject, shell_folder)
}

unsafe extern "system" fn parse_display_name(
    this: *mut c_void,
    _hwnd: HWND,
    _bind_ctx: *mut c_void,
    _name: *mut u16,
    _eaten: *mut ULONG,
    out: *mut Pidl,
    _attributes: *mut ULONG,
) -> HRESULT {
    null_out(out);
    from_shell_folder(this).folder.unsupported("ParseDisplayName").hresult()
}

unsafe extern "system" fn enum_objects(
    this: *mut c_void,
    _hwnd: HWND,
    flags: DWORD,
    out: *mut *mut c_void,
) -> HRESULT {
    com::guarded("EnumObjects", || {
        if out.is_null() {
            return E_POINTER;
        }
        *out = ptr::null_mut();
        let folder = &from_shell_folder(this).folder;
        match folder.enumerate(EnumFlags::from_bits_truncate(flags)) {
            Ok(Some(items)) => crate::enum_ids::create(items, out),
            Ok(None) => S_FALSE,
            Err(e) => e.hresult(),
        }
    })
}

unsafe extern "system" fn bind_to_object(
    this: *mut c_void,
    _item: PCPidl,
    _bind_ctx: *mut c_void,
    _iid: REFIID,
    out: *mut *mut c_void,
) -> HRESULT {
    null_out(out);
    from_shell_folder(this).folder.unsupported("BindToObject").hresult()
}

unsafe extern "system" fn bind_to_storage(
    this: *mut c_void,
    _item: PCPidl,
    _bind_ctx: *mut c_void,
    _iid: REFIID,
    out: *mut *mut c_void,
) -> HRESULT {
    null_out(out);
    from_shell_folder(this).folder.unsupported("BindToStorage").hresult()
}

unsafe extern "system" fn compare_ids(
    this: *mut c_void,
    param: LPARAM,
    a: PCPidl,
    b: PCPidl,
) -> HRESULT {
    com::guarded("CompareIDs", || {
        let (Some(a), Some(b)) = (IdListRef::from_raw(a), IdListRef::from_raw(b)) else {
            return E_INVALIDARG;
        };
        let ordering = from_shell_folder(this).folder.compare(param as u32, a, b);
        com::success_count(ordering_code(ordering) as u32)
    })
}

unsafe extern "system" fn create_view_object(
    this: *mut c_void,
    _owner: HWND,
    iid: REFIID,
    out: *mut *mut c_void,
) -> HRESULT {
    com::guarded("CreateViewObject", || {
        if out.is_null() {
            return E_POINTER;
        }
        *out = ptr::null_mut();
        let Some(requested) = iid.as_ref() else {
            return E_INVALIDARG;
        };
        let object = from_shell_folder(this);

        if guid_eq(requested, &IID_ISHELLVIEW) {
            let create = SfvCreate {
                size: std::mem::size_of::<SfvCreate>() as UINT,
                folder: object.shell_folder_ptr(),
                outer_view: ptr::null_mut(),
                callback: object.view_callback_ptr(),
            };
            let hr = SHCreateShellFolderView(&create, out);
            if hr < 0 {
                warn!("SHCreateShellFolderView failed: {:#x}", hr);
            }
            hr
        } else if guid_eq(requested, &IID_IDROPTARGET) {
            com::query(object as *const FolderObject, iid, out)
        } else {
            debug!("CreateViewObject {} refused", com::iid_name(requested));
            E_NOINTERFACE
        }
    })
}

unsafe extern "system" fn get_attributes_of(
    this: *mut c_void,
    count: UINT,
    items: *const PCPidl,
    in_out: *mut ULONG,
) -> HRESULT {
    com::guarded("GetAttributesOf", || {
        if in_out.is_null() {
            return E_POINTER;
        }
        let Some(items) = item_views(count, items) else {
            return E_INVALIDARG;
        };
        let folder = &from_shell_folder(this).folder;
        *in_out = folder
            .attributes_of(&items, Attributes::from_bits_truncate(*in_out))
            .bits();
        S_OK
    })
}

unsafe extern "system" fn get_ui_object_of(
    this: *mut c_void,
    _owner: HWND,
    count: UINT,
    items: *const PCPidl,
    iid: REFIID,
    _reserved: *mut UINT,
    out: *mut *mut c_void,
) -> HRESULT {
    com::guarded("GetUIObjectOf", || {
        if out.is_null() {
            return E_POINTER;
        }
        *out = ptr::null_mut();
        let Some(requested) = iid.as_ref() else {
            return E_INVALIDARG;
        };
        let Some(items) = item_views(count, items) else {
            return E_INVALIDARG;
        };

        let request = if guid_eq(requested, &IID_IDROPTARGET) {
            UiRequest::DropTarget
        } else if guid_eq(requested, &IID_ICONTEXTMENU) {
            UiRequest::ContextMenu
        } else {
            UiRequest::Other
        };

        let object = com::object_of!(this, FolderObject, shell_folder);
        match (*object).folder.ui_object_of(&items, request) {
            Ok(UiObject::DropTarget) => com::query(object as *const FolderObject, iid, out),
            Ok(UiObject::Commands(commands)) => crate::context_menu::create(object, commands, iid, out),
            Err(e) => {
                debug!("GetUIObjectOf {} refused: {}", com::iid_name(requested), e);
                e.hresult()
            }
        }
    })
}

unsafe extern "system" fn get_display_name_of(
    this: *mut c_void,
    item: PCPidl,
    flags: DWORD,
    name: *mut StrRet,
) -> HRESULT {
    com::guarded("GetDisplayNameOf", || {
        if name.is_null() {
            return E_POINTER;
        }
        let Some(item) = IdListRef::from_raw(item) else {
            return E_INVALIDARG;
        };
        let folder = &from_shell_folder(this).folder;
        match folder.display_name_of(item, NameFlags::from_bits_truncate(flags)) {
            Ok(text) => set_strret(name, &text),
            Err(e) => e.hresult(),
        }
    })
}

unsafe extern "system" fn set_name_of(
    this: *mut c_void,
    _owner: HWND,
    _item: PCPidl,
    _name: LPCWSTR,
    _flags: DWORD,
    out: *mut Pidl,
) -> HRESULT {
    null_out(out);
    from_shell_folder(this).folder.unsupported("SetNameOf").hresult()
}

unsafe extern "system" fn get_default_search_guid(this: *mut c_void, _guid: *mut GUID) -> HRESULT {
    from_shell_folder(this).folder.unsupported("GetDefaultSearchGUID").hresult()
}

unsafe extern "system" fn enum_searches(this: *mut c_void, out: *mut *mut c_void) -> HRESULT {
    null_out(out);
    from_shell_folder(this).folder.unsupported("EnumSearches").hresult()
}

unsafe extern "system" fn get_default_column(
    this: *mut c_void,
    _reserved: DWORD,
    sort: *mut ULONG,
    display: *mut ULONG,
) -> HRESULT {
    let (sort_column, display_column) = from_shell_folder(this).folder.default_column();
    if !sort.is_null() {
        *sort = sort_column.index();
    }
    if !display.is_null() {
        *display = display_column.index();
    }
    S_OK
}

unsafe extern "system" fn get_default_column_state(
    this: *mut c_void,
    column: UINT,
    flags: *mut DWORD,
) -> HRESULT {
    if flags.is_null() {
        return E_POINTER;
    }
    match from_shell_folder(this).folder.column_state(column) {
        Ok(state) => {
            *flags = state.bits();
            S_OK
        }
        Err(e) => e.hresult(),
    }
}

unsafe extern "system" fn get_details_ex(
    this: *mut c_void,
    _item: PCPidl,
    _column: *const ShColumnId,
    _value: *mut c_void,
) -> HRESULT {
    from_shell_folder(this).folder.unsupported("GetDetailsEx").hresult()
}

unsafe extern "system" fn get_details_of(
    this: *mut c_void,
    item: PCPidl,
    column: UINT,
    details: *mut ShellDetails,
) -> HRESULT {
    com::guarded("GetDetailsOf", || {
        if details.is_null() {
            return E_POINTER;
        }
        let folder = &from_shell_folder(this).folder;
        match folder.details_of(IdListRef::from_raw(item), column) {
            Ok(cell) => {
                (*details).fmt = cell.alignment as i32;
                (*details).cx_char = cell.width;
                set_strret(&mut (*details).text, &cell.text)
            }
            Err(e) => e.hresult(),
        }
    })
}

unsafe extern "system" fn map_column_to_scid(
    this: *mut c_void,
    _column: UINT,
    _scid: *mut ShColumnId,
) -> HRESULT {
    from_shell_folder(this).folder.unsupported("MapColumnToSCID").hresult()
}

static SHELL_FOLDER_VTBL: IShellFolder2Vtbl = IShellFolder2Vtbl {
    unknown: IUnknownVtbl {
        query_interface: sf_query_interface,
        add_ref: sf_add_ref,
        release: sf_release,
    },
    parse_display_name,
    enum_objects,
    bind_to_object,
    bind_to_storage,
    compare_ids,
    create_view_object,
    get_attributes_of,
    get_ui_object_of,
    get_display_name_of,
    set_name_of,
    get_default_search_guid,
    enum_searches,
    get_default_column,
    get_default_column_state,
    get_details_ex,
    get_details_of,
    map_column_to_scid,
};

// IPersistFolder2

unknown_thunks!(FolderObject, persist, pf_query_interface, pf_add_ref, pf_release);

unsafe fn from_persist<'a>(this: *mut c_void) -> &'a FolderObject {
    &*com::object_of!(this, FolderObject, persist)
}

unsafe extern "system" fn get_class_id(_this: *mut c_void, class_id: *mut GUID) -> HRESULT {
    if class_id.is_null() {
        return E_POINTER;
    }
    *class_id = com::CLSID_MODULE_FOLDER;
    S_OK
}

unsafe extern "system" fn initialize(this: *mut c_void, location: PCPidl) -> HRESULT {
    com::guarded("Initialize", || {
        com::to_hresult(from_persist(this).folder.initialize(IdListRef::from_raw(location)))
    })
}

unsafe extern "system" fn get_cur_folder(this: *mut c_void, out: *mut Pidl) -> HRESULT {
    com::guarded("GetCurFolder", || {
        if out.is_null() {
            return E_POINTER;
        }
        *out = ptr::null_mut();
        match from_persist(this).folder.current_folder() {
            Ok(location) => {
                let copy = com::alloc_id_list(&location);
                if copy.is_null() {
                    return E_OUTOFMEMORY;
                }
                *out = copy;
                S_OK
            }
            Err(e) => e.hresult(),
        }
    })
}

static PERSIST_VTBL: IPersistFolder2Vtbl = IPersistFolder2Vtbl {
    unknown: IUnknownVtbl {
        query_interface: pf_query_interface,
        add_ref: pf_add_ref,
        release: pf_release,
    },
    get_class_id,
    initialize,
    get_cur_folder,
};

// IShellFolderViewCB

unknown_thunks!(FolderObject, view_callback, vc_query_interface, vc_add_ref, vc_release);

unsafe extern "system" fn message_sfvcb(
    this: *mut c_void,
    message: UINT,
    _wparam: WPARAM,
    _lparam: LPARAM,
) -> HRESULT {
    let object = &*com::object_of!(this, FolderObject, view_callback);
    com::to_hresult(object.folder.view_callback(message))
}

static VIEW_CALLBACK_VTBL: IShellFolderViewCBVtbl = IShellFolderViewCBVtbl {
    unknown: IUnknownVtbl {
        query_interface: vc_query_interface,
        add_ref: vc_add_ref,
        release: vc_release,
    },
    message_sfvcb,
};

// IDropTarget

unknown_thunks!(FolderObject, drop_target, dt_query_interface, dt_add_ref, dt_release);

unsafe fn from_drop_target<'a>(this: *mut c_void) -> &'a FolderObject {
    &*com::object_of!(this, FolderObject, drop_target)
}

unsafe extern "system" fn drag_enter(
    this: *mut c_void,
    data: *mut c_void,
    _key_state: DWORD,
    _point: POINTL,
    effect: *mut DWORD,
) -> HRESULT {
    com::guarded("DragEnter", || {
        if effect.is_null() {
            return E_POINTER;
        }
        let Some(source) = DataObject::borrow(data) else {
            *effect = 0;
            return E_INVALIDARG;
        };
        let folder = &from_drop_target(this).folder;
        *effect = folder
            .drag_enter(&source, DropEffect::from_bits_truncate(*effect))
            .bits();
        S_OK
    })
}

unsafe extern "system" fn drag_over(
    this: *mut c_void,
    _key_state: DWORD,
    _point: POINTL,
    effect: *mut DWORD,
) -> HRESULT {
    com::guarded("DragOver", || {
        if effect.is_null() {
            return E_POINTER;
        }
        let folder = &from_drop_target(this).folder;
        *effect = folder.drag_over(DropEffect::from_bits_truncate(*effect)).bits();
        S_OK
    })
}

unsafe extern "system" fn drag_leave(this: *mut c_void) -> HRESULT {
    from_drop_target(this).folder.drag_leave();
    S_OK
}

unsafe extern "system" fn drop_items(
    this: *mut c_void,
    data: *mut c_void,
    _key_state: DWORD,
    _point: POINTL,
    effect: *mut DWORD,
) -> HRESULT {
    com::guarded("Drop", || {
        if effect.is_null() {
            return E_POINTER;
        }
        let folder = &from_drop_target(this).folder;
        let Some(source) = DataObject::borrow(data) else {
            folder.drag_leave();
            *effect = 0;
            return E_INVALIDARG;
        };
        let (result, loaded) = folder.drop_data(&source, DropEffect::from_bits_truncate(*effect));
        debug!("Drop loaded {} modules", loaded);
        *effect = result.bits();
        S_OK
    })
}

static DROP_TARGET_VTBL: IDropTargetVtbl = IDropTargetVtbl {
    unknown: IUnknownVtbl {
        query_interface: dt_query_interface,
        add_ref: dt_add_ref,
        release: dt_release,
    },
    drag_enter,
    drag_over,
    drag_leave,
    drop: drop_items,
};

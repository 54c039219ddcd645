//! `IContextMenu` for a selection of modules.
//!
//! Every item is a plain string entry, so the owner-draw interfaces
//! (`IContextMenu2`, `IContextMenu3`) are not offered.

use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::atomic::AtomicU32;

use tracing::{debug, warn};
use winapi::shared::basetsd::UINT_PTR;
use winapi::shared::guiddef::{GUID, REFIID};
use winapi::shared::minwindef::{FALSE, UINT};
use winapi::shared::ntdef::HRESULT;
use winapi::shared::windef::HMENU;
use winapi::um::winuser::{InsertMenuW, SetMenuDefaultItem, MF_BYPOSITION, MF_STRING};

use modfolder::folder::{Command, ItemCommands};
use modfolder::wide::{from_wide_ptr, to_wide};

use crate::com::{
    self, guid_eq, unknown_thunks, ComObject, IUnknownVtbl, E_FAIL, E_INVALIDARG, E_POINTER,
    IID_ICONTEXTMENU, IID_IUNKNOWN, S_OK,
};
use crate::ffi::{
    IContextMenuVtbl, InvokeCommandInfo, CMF_DEFAULTONLY, CMIC_MASK_UNICODE, GCS_HELPTEXTA,
    GCS_HELPTEXTW, GCS_VALIDATEA, GCS_VALIDATEW, GCS_VERBA, GCS_VERBW, INVOKE_COMMAND_INFO_SIZE,
};
use crate::folder::FolderObject;

#[repr(C)]
struct ContextMenu {
    vtbl: *const IContextMenuVtbl,
    refs: AtomicU32,
    /// Holds a reference for the menu's lifetime
    folder: *mut FolderObject,
    commands: ItemCommands,
}

unsafe impl ComObject for ContextMenu {
    fn refs(&self) -> &AtomicU32 {
        &self.refs
    }

    fn interface(&self, iid: &GUID) -> *mut c_void {
        if guid_eq(iid, &IID_IUNKNOWN) || guid_eq(iid, &IID_ICONTEXTMENU) {
            &self.vtbl as *const _ as *mut c_void
        } else {
            ptr::null_mut()
        }
    }
}

impl Drop for ContextMenu {
    fn drop(&mut self) {
        unsafe { com::release(self.folder) };
    }
}

unknown_thunks!(ContextMenu, vtbl, query_interface, add_ref, release);

unsafe fn from_this<'a>(this: *mut c_void) -> &'a ContextMenu {
    &*com::object_of!(this, ContextMenu, vtbl)
}

unsafe extern "system" fn query_context_menu(
    this: *mut c_void,
    menu: HMENU,
    index: UINT,
    first: UINT,
    last: UINT,
    flags: UINT,
) -> HRESULT {
    com::guarded("QueryContextMenu", || {
        if menu.is_null() {
            return E_INVALIDARG;
        }
        if flags & CMF_DEFAULTONLY != 0 {
            return com::success_count(0);
        }
        if first > last {
            return E_INVALIDARG;
        }

        let mut inserted = 0;
        for command in Command::ALL {
            let id = first + command.offset();
            if id > last {
                warn!("Menu identifier range exhausted at {:?}", command);
                break;
            }
            let label = to_wide(command.label());
            if InsertMenuW(menu, index + inserted, MF_BYPOSITION | MF_STRING, id as usize, label.as_ptr()) == 0 {
                warn!("InsertMenuW failed for {:?}", command);
                break;
            }
            inserted += 1;
        }

        if inserted > 0 {
            let default = from_this(this).commands.default_command();
            SetMenuDefaultItem(menu, first + default.offset(), FALSE as UINT);
        }
        debug!("Inserted {} menu items", inserted);
        com::success_count(inserted)
    })
}

/// Command named by an invocation, by offset or by verb
unsafe fn command_of(info: &InvokeCommandInfo) -> Option<Command> {
    let unicode = info.size as usize > INVOKE_COMMAND_INFO_SIZE && info.mask & CMIC_MASK_UNICODE != 0;
    if unicode && (info.verb_w as usize) >> 16 != 0 {
        return from_wide_ptr(info.verb_w).and_then(|verb| Command::from_verb(&verb));
    }

    let raw = info.verb as usize;
    if raw >> 16 == 0 {
        return Command::from_offset(raw as u32);
    }
    let verb = CStr::from_ptr(info.verb).to_string_lossy();
    Command::from_verb(&verb)
}

unsafe extern "system" fn invoke_command(this: *mut c_void, info: *const InvokeCommandInfo) -> HRESULT {
    com::guarded("InvokeCommand", || {
        let Some(info) = info.as_ref() else {
            return E_POINTER;
        };
        let Some(command) = command_of(info) else {
            debug!("InvokeCommand with an unknown verb");
            return E_FAIL;
        };
        let menu = from_this(this);
        com::to_hresult((*menu.folder).folder().invoke(&menu.commands, command))
    })
}

unsafe fn copy_ansi(text: &str, out: *mut i8, capacity: usize) {
    let len = text.len().min(capacity - 1);
    ptr::copy_nonoverlapping(text.as_ptr() as *const i8, out, len);
    *out.add(len) = 0;
}

unsafe fn copy_wide(text: &str, out: *mut u16, capacity: usize) {
    let wide = to_wide(text);
    let len = (wide.len() - 1).min(capacity - 1);
    ptr::copy_nonoverlapping(wide.as_ptr(), out, len);
    *out.add(len) = 0;
}

unsafe extern "system" fn get_command_string(
    _this: *mut c_void,
    id: UINT_PTR,
    kind: UINT,
    _reserved: *mut UINT,
    name: *mut i8,
    capacity: UINT,
) -> HRESULT {
    com::guarded("GetCommandString", || {
        let Some(command) = Command::from_offset(id as u32) else {
            return E_INVALIDARG;
        };
        if kind == GCS_VALIDATEA || kind == GCS_VALIDATEW {
            return S_OK;
        }
        if name.is_null() || capacity == 0 {
            return E_POINTER;
        }

        let capacity = capacity as usize;
        match kind {
            GCS_VERBA => copy_ansi(command.verb(), name, capacity),
            GCS_HELPTEXTA => copy_ansi(command.help_text(), name, capacity),
            GCS_VERBW => copy_wide(command.verb(), name as *mut u16, capacity),
            GCS_HELPTEXTW => copy_wide(command.help_text(), name as *mut u16, capacity),
            _ => return E_INVALIDARG,
        }
        S_OK
    })
}

static VTBL: IContextMenuVtbl = IContextMenuVtbl {
    unknown: IUnknownVtbl {
        query_interface,
        add_ref,
        release,
    },
    query_context_menu,
    invoke_command,
    get_command_string,
};

/// Menu over `commands`, keeping `folder` alive until the menu goes away
pub unsafe fn create(
    folder: *mut FolderObject,
    commands: ItemCommands,
    iid: REFIID,
    out: *mut *mut c_void,
) -> HRESULT {
    com::add_ref(folder);
    let menu = com::into_raw(ContextMenu {
        vtbl: &VTBL,
        refs: AtomicU32::new(1),
        folder,
        commands,
    });
    com::query_new(menu, iid, out)
}

//! Shell interface layouts and structures not covered by `winapi`'s features

#![allow(non_camel_case_types)]

use std::ffi::c_void;

use winapi::shared::basetsd::UINT_PTR;
use winapi::shared::guiddef::{GUID, REFIID};
use winapi::shared::minwindef::{BOOL, DWORD, LPARAM, UINT, ULONG, WPARAM};
use winapi::shared::ntdef::{HANDLE, HRESULT, LPCSTR, LPCWSTR};
use winapi::shared::windef::{HMENU, HWND, POINT, POINTL};

use crate::com::IUnknownVtbl;

pub type Pidl = *mut u8;
pub type PCPidl = *const u8;

pub const STRRET_WSTR: UINT = 0;
pub const MAX_PATH: usize = 260;

/// `STRRET`
#[repr(C)]
pub struct StrRet {
    pub kind: UINT,
    pub data: StrRetData,
}

#[repr(C)]
pub union StrRetData {
    pub ole_str: *mut u16,
    pub offset: UINT,
    pub c_str: [u8; MAX_PATH],
}

/// `SHELLDETAILS`
#[repr(C)]
pub struct ShellDetails {
    pub fmt: i32,
    pub cx_char: i32,
    pub text: StrRet,
}

/// `SHCOLUMNID`
#[repr(C)]
pub struct ShColumnId {
    pub fmtid: GUID,
    pub pid: DWORD,
}

pub const DVASPECT_CONTENT: DWORD = 1;
pub const TYMED_HGLOBAL: DWORD = 1;
pub const CF_HDROP: u16 = 15;

/// `FORMATETC`
#[repr(C)]
pub struct FormatEtc {
    pub format: u16,
    pub target_device: *mut c_void,
    pub aspect: DWORD,
    pub index: i32,
    pub tymed: DWORD,
}

impl FormatEtc {
    pub fn global(format: u16) -> Self {
        Self {
            format,
            target_device: std::ptr::null_mut(),
            aspect: DVASPECT_CONTENT,
            index: -1,
            tymed: TYMED_HGLOBAL,
        }
    }
}

/// `STGMEDIUM` restricted to the `HGLOBAL` member
#[repr(C)]
pub struct StgMedium {
    pub tymed: DWORD,
    pub global: HANDLE,
    pub release_unknown: *mut c_void,
}

pub const CMF_DEFAULTONLY: UINT = 0x0000_0001;
pub const CMIC_MASK_UNICODE: DWORD = 0x0000_4000;
pub const GCS_VERBA: UINT = 0x0000_0000;
pub const GCS_HELPTEXTA: UINT = 0x0000_0001;
pub const GCS_VALIDATEA: UINT = 0x0000_0002;
pub const GCS_VERBW: UINT = 0x0000_0004;
pub const GCS_HELPTEXTW: UINT = 0x0000_0005;
pub const GCS_VALIDATEW: UINT = 0x0000_0006;

/// `CMINVOKECOMMANDINFOEX`; the plain structure is its prefix
#[repr(C)]
pub struct InvokeCommandInfo {
    pub size: DWORD,
    pub mask: DWORD,
    pub hwnd: HWND,
    pub verb: LPCSTR,
    pub parameters: LPCSTR,
    pub directory: LPCSTR,
    pub show: i32,
    pub hot_key: DWORD,
    pub icon: HANDLE,
    pub title: LPCSTR,
    pub verb_w: LPCWSTR,
    pub parameters_w: LPCWSTR,
    pub directory_w: LPCWSTR,
    pub title_w: LPCWSTR,
    pub invoke_point: POINT,
}

/// Byte size of the plain `CMINVOKECOMMANDINFO`
pub const INVOKE_COMMAND_INFO_SIZE: usize = std::mem::offset_of!(InvokeCommandInfo, title);

/// `SFV_CREATE`
#[repr(C)]
pub struct SfvCreate {
    pub size: UINT,
    pub folder: *mut c_void,
    pub outer_view: *mut c_void,
    pub callback: *mut c_void,
}

#[link(name = "shell32")]
extern "system" {
    pub fn SHCreateShellFolderView(create: *const SfvCreate, view: *mut *mut c_void) -> HRESULT;
}

#[link(name = "ole32")]
extern "system" {
    pub fn ReleaseStgMedium(medium: *mut StgMedium);
}

type Out = *mut *mut c_void;

#[repr(C)]
pub struct IShellFolder2Vtbl {
    pub unknown: IUnknownVtbl,
    pub parse_display_name: unsafe extern "system" fn(
        *mut c_void,
        HWND,
        *mut c_void,
        *mut u16,
        *mut ULONG,
        *mut Pidl,
        *mut ULONG,
    ) -> HRESULT,
    pub enum_objects: unsafe extern "system" fn(*mut c_void, HWND, DWORD, Out) -> HRESULT,
    pub bind_to_object:
        unsafe extern "system" fn(*mut c_void, PCPidl, *mut c_void, REFIID, Out) -> HRESULT,
    pub bind_to_storage:
        unsafe extern "system" fn(*mut c_void, PCPidl, *mut c_void, REFIID, Out) -> HRESULT,
    pub compare_ids: unsafe extern "system" fn(*mut c_void, LPARAM, PCPidl, PCPidl) -> HRESULT,
    pub create_view_object: unsafe extern "system" fn(*mut c_void, HWND, REFIID, Out) -> HRESULT,
    pub get_attributes_of:
        unsafe extern "system" fn(*mut c_void, UINT, *const PCPidl, *mut ULONG) -> HRESULT,
    pub get_ui_object_of: unsafe extern "system" fn(
        *mut c_void,
        HWND,
        UINT,
        *const PCPidl,
        REFIID,
        *mut UINT,
        Out,
    ) -> HRESULT,
    pub get_display_name_of:
        unsafe extern "system" fn(*mut c_void, PCPidl, DWORD, *mut StrRet) -> HRESULT,
    pub set_name_of: unsafe extern "system" fn(
        *mut c_void,
        HWND,
        PCPidl,
        LPCWSTR,
        DWORD,
        *mut Pidl,
    ) -> HRESULT,
    pub get_default_search_guid: unsafe extern "system" fn(*mut c_void, *mut GUID) -> HRESULT,
    pub enum_searches: unsafe extern "system" fn(*mut c_void, Out) -> HRESULT,
    pub get_default_column:
        unsafe extern "system" fn(*mut c_void, DWORD, *mut ULONG, *mut ULONG) -> HRESULT,
    pub get_default_column_state: unsafe extern "system" fn(*mut c_void, UINT, *mut DWORD) -> HRESULT,
    pub get_details_ex:
        unsafe extern "system" fn(*mut c_void, PCPidl, *const ShColumnId, *mut c_void) -> HRESULT,
    pub get_details_of:
        unsafe extern "system" fn(*mut c_void, PCPidl, UINT, *mut ShellDetails) -> HRESULT,
    pub map_column_to_scid: unsafe extern "system" fn(*mut c_void, UINT, *mut ShColumnId) -> HRESULT,
}

#[repr(C)]
pub struct IPersistFolder2Vtbl {
    pub unknown: IUnknownVtbl,
    pub get_class_id: unsafe extern "system" fn(*mut c_void, *mut GUID) -> HRESULT,
    pub initialize: unsafe extern "system" fn(*mut c_void, PCPidl) -> HRESULT,
    pub get_cur_folder: unsafe extern "system" fn(*mut c_void, *mut Pidl) -> HRESULT,
}

#[repr(C)]
pub struct IShellFolderViewCBVtbl {
    pub unknown: IUnknownVtbl,
    pub message_sfvcb: unsafe extern "system" fn(*mut c_void, UINT, WPARAM, LPARAM) -> HRESULT,
}

#[repr(C)]
pub struct IDropTargetVtbl {
    pub unknown: IUnknownVtbl,
    pub drag_enter:
        unsafe extern "system" fn(*mut c_void, *mut c_void, DWORD, POINTL, *mut DWORD) -> HRESULT,
    pub drag_over: unsafe extern "system" fn(*mut c_void, DWORD, POINTL, *mut DWORD) -> HRESULT,
    pub drag_leave: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    pub drop:
        unsafe extern "system" fn(*mut c_void, *mut c_void, DWORD, POINTL, *mut DWORD) -> HRESULT,
}

#[repr(C)]
pub struct IEnumIDListVtbl {
    pub unknown: IUnknownVtbl,
    pub next: unsafe extern "system" fn(*mut c_void, ULONG, *mut Pidl, *mut ULONG) -> HRESULT,
    pub skip: unsafe extern "system" fn(*mut c_void, ULONG) -> HRESULT,
    pub reset: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    pub clone: unsafe extern "system" fn(*mut c_void, Out) -> HRESULT,
}

#[repr(C)]
pub struct IContextMenuVtbl {
    pub unknown: IUnknownVtbl,
    pub query_context_menu:
        unsafe extern "system" fn(*mut c_void, HMENU, UINT, UINT, UINT, UINT) -> HRESULT,
    pub invoke_command: unsafe extern "system" fn(*mut c_void, *const InvokeCommandInfo) -> HRESULT,
    pub get_command_string:
        unsafe extern "system" fn(*mut c_void, UINT_PTR, UINT, *mut UINT, *mut i8, UINT) -> HRESULT,
}

#[repr(C)]
pub struct IClassFactoryVtbl {
    pub unknown: IUnknownVtbl,
    pub create_instance: unsafe extern "system" fn(*mut c_void, *mut c_void, REFIID, Out) -> HRESULT,
    pub lock_server: unsafe extern "system" fn(*mut c_void, BOOL) -> HRESULT,
}

/// Leading methods of `IDataObject`, as far as the folder calls them
#[repr(C)]
pub struct IDataObjectVtbl {
    pub unknown: IUnknownVtbl,
    pub get_data: unsafe extern "system" fn(*mut c_void, *const FormatEtc, *mut StgMedium) -> HRESULT,
    pub get_data_here:
        unsafe extern "system" fn(*mut c_void, *const FormatEtc, *mut StgMedium) -> HRESULT,
    pub query_get_data: unsafe extern "system" fn(*mut c_void, *const FormatEtc) -> HRESULT,
}

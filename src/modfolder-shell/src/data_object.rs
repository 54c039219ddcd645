//! Drag payloads read through the source's `IDataObject`

use std::ffi::c_void;
use std::ptr;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};
use winapi::shared::minwindef::UINT;
use winapi::shared::ntdef::HANDLE;
use winapi::um::shellapi::{DragQueryFileW, HDROP};
use winapi::um::winbase::{GlobalLock, GlobalSize, GlobalUnlock};
use winapi::um::winuser::RegisterClipboardFormatW;

use modfolder::cida;
use modfolder::folder::{DropFormat, DropSource};
use modfolder::wide::{from_wide, to_wide};

use crate::com::S_OK;
use crate::ffi::{FormatEtc, IDataObjectVtbl, ReleaseStgMedium, StgMedium, CF_HDROP, TYMED_HGLOBAL};

static ID_LIST_ARRAY_FORMAT: OnceCell<u16> = OnceCell::new();

fn id_list_array_format() -> u16 {
    *ID_LIST_ARRAY_FORMAT.get_or_init(|| {
        let name = to_wide(cida::FORMAT_NAME);
        let format = unsafe { RegisterClipboardFormatW(name.as_ptr()) };
        trace!("{} registered as {}", cida::FORMAT_NAME, format);
        format as u16
    })
}

fn clipboard_format(format: DropFormat) -> u16 {
    match format {
        DropFormat::FileList => CF_HDROP,
        DropFormat::IdListArray => id_list_array_format(),
    }
}

/// Payload object borrowed for the duration of one drag callback
pub struct DataObject {
    object: *mut c_void,
}

impl DataObject {
    pub unsafe fn borrow(object: *mut c_void) -> Option<Self> {
        if object.is_null() {
            None
        } else {
            Some(Self { object })
        }
    }

    fn vtbl(&self) -> &IDataObjectVtbl {
        unsafe { &**(self.object as *const *const IDataObjectVtbl) }
    }

    /// Fetch `format` as global memory and hand it to `read`
    fn with_global<T>(&self, format: u16, read: impl FnOnce(HANDLE) -> Option<T>) -> Option<T> {
        if format == 0 {
            return None;
        }
        let request = FormatEtc::global(format);
        let mut medium = StgMedium {
            tymed: 0,
            global: ptr::null_mut(),
            release_unknown: ptr::null_mut(),
        };
        let hr = unsafe { (self.vtbl().get_data)(self.object, &request, &mut medium) };
        if hr < 0 {
            debug!("GetData({}) failed: {:#x}", format, hr);
            return None;
        }

        let result = if medium.tymed == TYMED_HGLOBAL && !medium.global.is_null() {
            read(medium.global)
        } else {
            debug!("GetData({}) returned medium {}", format, medium.tymed);
            None
        };
        unsafe { ReleaseStgMedium(&mut medium) };
        result
    }
}

impl DropSource for DataObject {
    fn offers(&self, format: DropFormat) -> bool {
        let format = clipboard_format(format);
        if format == 0 {
            return false;
        }
        let request = FormatEtc::global(format);
        unsafe { (self.vtbl().query_get_data)(self.object, &request) == S_OK }
    }

    fn file_list(&self) -> Option<Vec<String>> {
        self.with_global(CF_HDROP, |global| {
            let drop = global as HDROP;
            let count = unsafe { DragQueryFileW(drop, UINT::MAX, ptr::null_mut(), 0) };
            let mut paths = Vec::with_capacity(count as usize);
            for index in 0..count {
                let len = unsafe { DragQueryFileW(drop, index, ptr::null_mut(), 0) };
                let mut buf = vec![0u16; len as usize + 1];
                let copied = unsafe { DragQueryFileW(drop, index, buf.as_mut_ptr(), len + 1) };
                if copied > 0 {
                    paths.push(from_wide(&buf));
                }
            }
            Some(paths)
        })
    }

    fn id_list_array(&self) -> Option<Vec<u8>> {
        self.with_global(id_list_array_format(), |global| unsafe {
            let size = GlobalSize(global);
            let data = GlobalLock(global) as *const u8;
            if data.is_null() {
                return None;
            }
            let bytes = std::slice::from_raw_parts(data, size).to_vec();
            GlobalUnlock(global);
            Some(bytes)
        })
    }
}

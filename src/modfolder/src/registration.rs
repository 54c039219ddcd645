//! Per-user registration of the folder with the shell
//!
//! Registration is described as data here and written by the server DLL, so
//! the exact tree is the same for both directions and can be checked without
//! touching a registry.

use crate::folder::Attributes;

/// Class registrations, relative to `HKEY_CURRENT_USER`
pub const CLASSES_ROOT: &str = "Software\\Classes\\CLSID";

/// Namespace extensions shown under "This PC"
pub const NAMESPACE_ROOT: &str =
    "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\MyComputer\\NameSpace";

/// "Browsable shell extension" component category
const CATEGORY_BROWSABLE: &str = "{00021490-0000-0000-C000-000000000046}";

/// `FWF_NOSUBFOLDERS`
const FOLDER_VALUE_FLAGS: u32 = 0x0000_0080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    String(String),
    Dword(u32),
}

/// One value to write; `name` of `None` is the key's default value and a
/// `value` of `None` only creates the key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegEntry {
    pub key: String,
    pub name: Option<&'static str>,
    pub value: Option<RegValue>,
}

impl RegEntry {
    fn key(key: String) -> Self {
        Self {
            key,
            name: None,
            value: None,
        }
    }

    fn string(key: String, name: Option<&'static str>, value: impl Into<String>) -> Self {
        Self {
            key,
            name,
            value: Some(RegValue::String(value.into())),
        }
    }

    fn dword(key: String, name: &'static str, value: u32) -> Self {
        Self {
            key,
            name: Some(name),
            value: Some(RegValue::Dword(value)),
        }
    }
}

pub fn class_key() -> String {
    format!("{}\\{}", CLASSES_ROOT, crate::CLASS_ID)
}

pub fn namespace_key() -> String {
    format!("{}\\{}", NAMESPACE_ROOT, crate::CLASS_ID)
}

/// Keys removed (with everything below them) on unregistration
pub fn owned_keys() -> [String; 2] {
    [class_key(), namespace_key()]
}

/// Everything written on registration, parents before children
pub fn entries(server_path: &str, display_name: &str) -> Vec<RegEntry> {
    let class = class_key();
    let sub = |name: &str| format!("{}\\{}", class, name);
    let attributes = Attributes::FOLDER | Attributes::DROPTARGET;

    vec![
        RegEntry::string(class.clone(), None, display_name),
        RegEntry::dword(class.clone(), "System.IsPinnedToNameSpaceTree", 1),
        RegEntry::key(sub(&format!("Implemented Categories\\{}", CATEGORY_BROWSABLE))),
        RegEntry::string(sub("InProcServer32"), None, server_path),
        RegEntry::string(sub("InProcServer32"), Some("ThreadingModel"), "Apartment"),
        RegEntry::dword(sub("ShellFolder"), "Attributes", attributes.bits()),
        RegEntry::dword(sub("ShellFolder"), "FolderValueFlags", FOLDER_VALUE_FLAGS),
        RegEntry::string(sub("DefaultIcon"), None, format!("{},-1", server_path)),
        RegEntry::string(namespace_key(), None, display_name),
    ]
}

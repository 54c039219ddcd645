//! Error taxonomy shared by every layer of the folder.
//!
//! Each variant maps onto the result code the host shell expects, so the COM
//! layer can hand errors back without inspecting them.

use thiserror::Error;

/// Host result codes used by the folder protocol.
pub mod hresult {
    pub const S_OK: i32 = 0;
    pub const S_FALSE: i32 = 1;
    pub const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;
    pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
    pub const E_POINTER: i32 = 0x8000_4003_u32 as i32;
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;

    /// Equivalent of `HRESULT_FROM_WIN32`
    pub fn from_win32(code: u32) -> i32 {
        if code as i32 <= 0 {
            code as i32
        } else {
            ((code & 0x0000_FFFF) | (7 << 16) | 0x8000_0000) as i32
        }
    }

    /// Success code carrying a 16-bit value, as produced by
    /// `MAKE_HRESULT(SEVERITY_SUCCESS, 0, code)`
    pub fn success_code(code: u16) -> i32 {
        i32::from(code)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Malformed identifier list: {0}")]
    MalformedIdList(String),

    #[error("Identifier is not owned by this folder")]
    ForeignItem,

    #[error("Operation not implemented")]
    NotImplemented,

    #[error("Interface not supported")]
    NoInterface,

    #[error("Out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    #[error("Folder has not been initialized")]
    NotInitialized,

    #[error("Selection contains no usable items")]
    EmptySelection,

    #[error("{context} failed with OS error {code}")]
    Os { context: String, code: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an OS error code with the name of the failing operation
    pub fn os(context: impl Into<String>, code: u32) -> Self {
        Error::Os {
            context: context.into(),
            code,
        }
    }

    /// OS error code carried by an [`Error::Os`]
    pub fn os_code(&self) -> Option<u32> {
        match self {
            Error::Os { code, .. } => Some(*code),
            Error::Io(e) => e.raw_os_error().map(|c| c as u32),
            _ => None,
        }
    }

    /// Result code to hand back to the host shell
    pub fn hresult(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::MalformedIdList(_) | Error::ForeignItem => {
                hresult::E_INVALIDARG
            }
            Error::NotImplemented => hresult::E_NOTIMPL,
            Error::NoInterface => hresult::E_NOINTERFACE,
            Error::OutOfMemory(_) => hresult::E_OUTOFMEMORY,
            Error::Os { code, .. } => hresult::from_win32(*code),
            Error::NotInitialized | Error::EmptySelection | Error::Config(_) | Error::Io(_) => {
                hresult::E_FAIL
            }
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory(0)
    }
}

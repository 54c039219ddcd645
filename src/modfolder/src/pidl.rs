//! Module item identifiers
//!
//! Each module shown in the folder is named by a single identifier-list record
//! carrying everything needed to render and act on it, so the folder never has
//! to look the module up again:
//!
//! ```text
//! offset  size  field
//!      0     2  cb (record size, including this field)
//!      2     4  signature 0x4C444F4D ("MODL")
//!      6     8  base address
//!     14     4  image size
//!     18   2*n  path, UTF-16LE, NUL-terminated
//! ```
//!
//! The host freely mixes records from other providers with ours, so every
//! accessor re-checks the signature before reading a field and never reads
//! past the record's declared size.

use byteorder::{ByteOrder, LE};
use serde::{Deserialize, Serialize};

use crate::idlist::{IdList, IdListRef, CB_LEN, TERMINATOR_LEN};
use crate::{Error, Result};

/// Record signature, "MODL" in little-endian byte order
pub const SIGNATURE: u32 = 0x4C44_4F4D;

const OFFSET_SIGNATURE: usize = CB_LEN;
const OFFSET_BASE_ADDRESS: usize = OFFSET_SIGNATURE + 4;
const OFFSET_IMAGE_SIZE: usize = OFFSET_BASE_ADDRESS + 8;
const OFFSET_PATH: usize = OFFSET_IMAGE_SIZE + 4;

/// Bytes before the variable-length path, `cb` included
pub const HEADER_LEN: usize = OFFSET_PATH;

/// A module mapped into the process, as carried by its item identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub path: String,
    pub base_address: u64,
    pub image_size: u32,
}

impl ModuleRecord {
    pub fn new(path: impl Into<String>, base_address: u64, image_size: u32) -> Self {
        Self {
            path: path.into(),
            base_address,
            image_size,
        }
    }

    /// File-name portion of the path
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// Encode this item as a single-record identifier list
    pub fn encode(&self) -> Result<IdList> {
        encode(&self.path, self.base_address, self.image_size)
    }
}

/// Encode a module as a single-record identifier list.
///
/// Only fails when the allocation fails or the path is too long to fit in a
/// record's 16-bit size field.
pub fn encode(path: &str, base_address: u64, image_size: u32) -> Result<IdList> {
    let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
    let cb = HEADER_LEN + wide.len() * 2;
    let cb16 = u16::try_from(cb).map_err(|_| Error::InvalidArgument("path too long"))?;

    let total = cb + TERMINATOR_LEN;
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(total)
        .map_err(|_| Error::OutOfMemory(total))?;
    bytes.resize(total, 0);

    LE::write_u16(&mut bytes[..CB_LEN], cb16);
    LE::write_u32(&mut bytes[OFFSET_SIGNATURE..], SIGNATURE);
    LE::write_u64(&mut bytes[OFFSET_BASE_ADDRESS..], base_address);
    LE::write_u32(&mut bytes[OFFSET_IMAGE_SIZE..], image_size);
    LE::write_u16_into(&wide, &mut bytes[OFFSET_PATH..cb]);

    Ok(IdList::from_vec_unchecked(bytes))
}

/// Record bounded by its declared size, if that size is plausible
fn bounded(record: &[u8]) -> Option<&[u8]> {
    if record.len() < CB_LEN {
        return None;
    }
    let cb = LE::read_u16(record) as usize;
    record.get(..cb)
}

/// True when `record` (starting at its `cb` field) is one of ours: large enough
/// for the fixed header and carrying our signature.
pub fn is_owned(record: &[u8]) -> bool {
    match bounded(record) {
        Some(record) if record.len() >= HEADER_LEN => {
            LE::read_u32(&record[OFFSET_SIGNATURE..]) == SIGNATURE
        }
        _ => false,
    }
}

/// True when the first record of `list` is one of ours
pub fn is_owned_list(list: IdListRef<'_>) -> bool {
    list.first().is_some_and(is_owned)
}

/// Locate our record in a list: the first record when it is ours, otherwise
/// the last record of a multi-level chain when that one is.
pub fn find_owned(list: IdListRef<'_>) -> Option<&[u8]> {
    if let Some(first) = list.first().filter(|r| is_owned(r)) {
        return Some(first);
    }
    list.last().filter(|r| is_owned(r))
}

/// Decode a single record, failing closed on foreign data
pub fn decode_record(record: &[u8]) -> Option<ModuleRecord> {
    if !is_owned(record) {
        return None;
    }
    let record = bounded(record)?;

    let base_address = LE::read_u64(&record[OFFSET_BASE_ADDRESS..]);
    let image_size = LE::read_u32(&record[OFFSET_IMAGE_SIZE..]);

    let units: Vec<u16> = record[OFFSET_PATH..]
        .chunks_exact(2)
        .map(LE::read_u16)
        .take_while(|&unit| unit != 0)
        .collect();

    Some(ModuleRecord {
        path: String::from_utf16_lossy(&units),
        base_address,
        image_size,
    })
}

/// Decode the record this folder owns within `list`, if there is one
pub fn decode(list: IdListRef<'_>) -> Option<ModuleRecord> {
    find_owned(list).and_then(decode_record)
}

/// Path stored in `list`, or an empty string for foreign data
pub fn path(list: IdListRef<'_>) -> String {
    decode(list).map(|item| item.path).unwrap_or_default()
}

/// Base address stored in `list`, or zero for foreign data
pub fn base_address(list: IdListRef<'_>) -> u64 {
    find_owned(list)
        .and_then(bounded)
        .map(|record| LE::read_u64(&record[OFFSET_BASE_ADDRESS..]))
        .unwrap_or(0)
}

/// Image size stored in `list`, or zero for foreign data
pub fn image_size(list: IdListRef<'_>) -> u32 {
    find_owned(list)
        .and_then(bounded)
        .map(|record| LE::read_u32(&record[OFFSET_IMAGE_SIZE..]))
        .unwrap_or(0)
}

/// File-name portion of a path, splitting on both separator styles so that
/// host paths render the same on every platform
pub fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreign(payload: &[u8]) -> Vec<u8> {
        let mut bytes = ((payload.len() + CB_LEN) as u16).to_le_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[0, 0]);
        bytes
    }

    #[test]
    fn test_encode_layout() {
        let list = encode("C:\\a.dll", 0x10000, 0x2000).unwrap();
        let bytes = list.as_bytes();

        let cb = LE::read_u16(bytes) as usize;
        assert_eq!(cb, HEADER_LEN + ("C:\\a.dll".len() + 1) * 2);
        assert_eq!(LE::read_u32(&bytes[2..]), SIGNATURE);
        assert_eq!(&bytes[2..6], b"MODL");
        assert_eq!(LE::read_u64(&bytes[6..]), 0x10000);
        assert_eq!(LE::read_u32(&bytes[14..]), 0x2000);
        // Path terminator, then list terminator
        assert_eq!(&bytes[cb - 2..cb], &[0, 0]);
        assert_eq!(&bytes[cb..], &[0, 0]);
        assert_eq!(bytes.len(), cb + TERMINATOR_LEN);
    }

    #[test]
    fn test_roundtrip() {
        let cases = [
            ("C:\\Windows\\System32\\kernel32.dll", 0x7FF8_1234_0000u64, 0x000C_2000u32),
            ("", 0, 0),
            ("C:\\Program Files\\Ünïcødé\\模块.dll", u64::MAX, u32::MAX),
        ];
        for (path, base, size) in cases {
            let list = encode(path, base, size).unwrap();
            let item = decode(list.view()).unwrap();
            assert_eq!(item, ModuleRecord::new(path, base, size));
        }
    }

    #[test]
    fn test_clone_preserves_semantics() {
        let list = encode("C:\\b.dll", 0x400000, 0x1000).unwrap();
        let clone = list.try_clone().unwrap();

        assert_eq!(is_owned_list(clone.view()), is_owned_list(list.view()));
        assert_eq!(decode(clone.view()), decode(list.view()));
        assert_eq!(clone.as_bytes(), list.as_bytes());
    }

    #[test]
    fn test_is_owned_rejects_bad_input() {
        assert!(!is_owned(&[]));
        // Zero-length record
        assert!(!is_owned(&[0, 0]));
        // Shorter than the fixed header
        assert!(!is_owned(&foreign(b"MODL1234")[..10]));

        // Right length, wrong signature
        let list = encode("C:\\a.dll", 1, 2).unwrap();
        let mut bytes = list.as_bytes().to_vec();
        bytes[2] = b'X';
        assert!(!is_owned(&bytes));
    }

    #[test]
    fn test_is_owned_rejects_truncated_record() {
        let list = encode("C:\\a.dll", 1, 2).unwrap();
        let bytes = list.as_bytes();
        // Declared size is intact but the buffer stops inside the header
        assert!(!is_owned(&bytes[..HEADER_LEN - 1]));
        assert!(is_owned(bytes));
    }

    #[test]
    fn test_foreign_items_fail_closed() {
        let bytes = foreign(b"some other provider's data");
        let view = IdListRef::new(&bytes);

        assert!(!is_owned_list(view));
        assert_eq!(decode(view), None);
        assert_eq!(path(view), "");
        assert_eq!(base_address(view), 0);
        assert_eq!(image_size(view), 0);
    }

    #[test]
    fn test_decode_falls_back_to_last_record() {
        let ours = encode("C:\\mod.dll", 0xABC000, 0x3000).unwrap();
        let parent = IdList::from_bytes(&foreign(b"this-pc")).unwrap();
        let absolute = parent.combine(ours.view()).unwrap();

        assert!(!is_owned_list(absolute.view()));
        let item = decode(absolute.view()).unwrap();
        assert_eq!(item.path, "C:\\mod.dll");
        assert_eq!(base_address(absolute.view()), 0xABC000);
        assert_eq!(image_size(absolute.view()), 0x3000);
    }

    #[test]
    fn test_decode_path_without_terminator() {
        // Hand-built record whose path runs to the end of the record
        let mut bytes = vec![0u8; HEADER_LEN + 4];
        LE::write_u16(&mut bytes, (HEADER_LEN + 4) as u16);
        LE::write_u32(&mut bytes[OFFSET_SIGNATURE..], SIGNATURE);
        LE::write_u16_into(&[u16::from(b'a'), u16::from(b'b')], &mut bytes[OFFSET_PATH..]);
        bytes.extend_from_slice(&[0, 0]);

        assert_eq!(path(IdListRef::new(&bytes)), "ab");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("C:\\a.dll"), "a.dll");
        assert_eq!(file_name("/usr/lib/libc.so.6"), "libc.so.6");
        assert_eq!(file_name("plain.dll"), "plain.dll");
        assert_eq!(file_name("C:\\dir\\"), "");
    }
}

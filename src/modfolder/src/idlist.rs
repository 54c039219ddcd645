//! Identifier lists (the host's `ITEMIDLIST` container)
//!
//! An identifier list is a chain of variable-length records. Every record
//! starts with a little-endian `u16` byte count (`cb`) that includes the count
//! itself, and the chain ends with a record whose count is zero:
//!
//! ```text
//! [cb][payload...][cb][payload...]...[0x0000]
//! ```
//!
//! The payload of each record belongs to whichever namespace provider created
//! it, so nothing in this module interprets record contents. See
//! [`crate::pidl`] for the records this folder owns.

use byteorder::{ByteOrder, LE};
use std::fmt;

use crate::{Error, Result};

/// Size of the per-record byte count
pub const CB_LEN: usize = 2;

/// Size of the zero byte count closing a list
pub const TERMINATOR_LEN: usize = CB_LEN;

/// Borrowed view over an identifier list supplied by the host.
///
/// The view never reads beyond the slice it wraps: a record whose declared
/// size runs past the end of the slice ends iteration.
#[derive(Clone, Copy)]
pub struct IdListRef<'a> {
    bytes: &'a [u8],
}

impl<'a> IdListRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Build a view from a raw, terminator-closed list.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a well-formed identifier list that stays alive and
    /// unmodified for `'a`.
    pub unsafe fn from_raw(ptr: *const u8) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let mut len = 0usize;
        loop {
            let cb_bytes = std::slice::from_raw_parts(ptr.add(len), CB_LEN);
            let cb = LE::read_u16(cb_bytes) as usize;
            if cb == 0 {
                len += TERMINATOR_LEN;
                break;
            }
            if cb < CB_LEN {
                // A record shorter than its own count field would loop forever
                break;
            }
            len += cb;
        }
        Some(Self::new(std::slice::from_raw_parts(ptr, len)))
    }

    /// Raw bytes of the view, as handed in
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterate over the records of the list, each including its `cb` field
    pub fn items(&self) -> Items<'a> {
        Items {
            bytes: self.bytes,
            offset: 0,
        }
    }

    /// True for the empty list (the namespace root)
    pub fn is_empty(&self) -> bool {
        self.items().next().is_none()
    }

    pub fn first(&self) -> Option<&'a [u8]> {
        self.items().next()
    }

    /// Last record of the chain, the equivalent of `ILFindLastID`
    pub fn last(&self) -> Option<&'a [u8]> {
        self.items().last()
    }

    /// Number of records in the chain
    pub fn depth(&self) -> usize {
        self.items().count()
    }

    /// Bytes occupied by the records plus the terminator, as `ILGetSize`
    pub fn byte_len(&self) -> usize {
        self.items().map(<[u8]>::len).sum::<usize>() + TERMINATOR_LEN
    }

    /// Copy the chain into an owned list
    pub fn to_id_list(&self) -> Result<IdList> {
        IdList::from_items(self.items())
    }
}

impl fmt::Debug for IdListRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items().map(|item| item.len()))
            .finish()
    }
}

/// Iterator over the records of an identifier list
#[derive(Clone)]
pub struct Items<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Items<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.offset..)?;
        if rest.len() < CB_LEN {
            return None;
        }
        let cb = LE::read_u16(rest) as usize;
        if cb < CB_LEN || cb > rest.len() {
            return None;
        }
        self.offset += cb;
        Some(&rest[..cb])
    }
}

/// Owned, terminator-closed identifier list.
///
/// The buffer always ends in a zero byte count, so [`IdList::as_bytes`] can be
/// handed to the host as-is.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdList {
    bytes: Vec<u8>,
}

impl IdList {
    /// The empty list, which names the namespace root
    pub fn empty() -> Self {
        Self {
            bytes: vec![0; TERMINATOR_LEN],
        }
    }

    /// Build a list from records that each start with their own `cb` field
    pub fn from_items<'a, I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
        I::IntoIter: Clone,
    {
        let items = items.into_iter();
        let total = items.clone().map(<[u8]>::len).sum::<usize>() + TERMINATOR_LEN;

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(total)
            .map_err(|_| Error::OutOfMemory(total))?;

        for item in items {
            if item.len() < CB_LEN || LE::read_u16(item) as usize != item.len() {
                return Err(Error::MalformedIdList(format!(
                    "record of {} bytes has a mismatched size field",
                    item.len()
                )));
            }
            bytes.extend_from_slice(item);
        }
        bytes.extend_from_slice(&[0; TERMINATOR_LEN]);
        Ok(Self { bytes })
    }

    /// Validate and copy a list held in a host buffer.
    ///
    /// Copying stops at the terminator; a chain that runs off the end of
    /// `bytes` before reaching one is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut offset = 0usize;
        loop {
            let Some(rest) = bytes.get(offset..).filter(|r| r.len() >= CB_LEN) else {
                return Err(Error::MalformedIdList(format!(
                    "missing terminator after {} bytes",
                    offset
                )));
            };
            let cb = LE::read_u16(rest) as usize;
            if cb == 0 {
                break;
            }
            if cb < CB_LEN || cb > rest.len() {
                return Err(Error::MalformedIdList(format!(
                    "record at offset {} declares {} bytes, {} available",
                    offset,
                    cb,
                    rest.len()
                )));
            }
            offset += cb;
        }

        let total = offset + TERMINATOR_LEN;
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(total)
            .map_err(|_| Error::OutOfMemory(total))?;
        owned.extend_from_slice(&bytes[..total]);
        Ok(Self { bytes: owned })
    }

    /// Wrap a buffer produced by this crate's encoders
    pub(crate) fn from_vec_unchecked(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= TERMINATOR_LEN);
        Self { bytes }
    }

    pub fn view(&self) -> IdListRef<'_> {
        IdListRef::new(&self.bytes)
    }

    /// Bytes of the list including the terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }

    /// Byte-exact copy that reports allocation failure instead of aborting
    pub fn try_clone(&self) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(self.bytes.len())
            .map_err(|_| Error::OutOfMemory(self.bytes.len()))?;
        bytes.extend_from_slice(&self.bytes);
        Ok(Self { bytes })
    }

    /// Append a relative chain to this one, as `ILCombine`
    pub fn combine(&self, child: IdListRef<'_>) -> Result<Self> {
        Self::from_items(self.view().items().chain(child.items()))
    }
}

impl fmt::Debug for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdList").field(&self.view()).finish()
    }
}

impl Default for IdList {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((payload.len() + CB_LEN) as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn chain(payloads: &[&[u8]]) -> Vec<u8> {
        let mut bytes: Vec<u8> = payloads.iter().flat_map(|p| record(p)).collect();
        bytes.extend_from_slice(&[0, 0]);
        bytes
    }

    #[test]
    fn test_empty_list() {
        let list = IdList::empty();
        assert!(list.is_empty());
        assert_eq!(list.as_bytes(), &[0, 0]);
        assert_eq!(list.view().byte_len(), TERMINATOR_LEN);
        assert_eq!(list.view().depth(), 0);
    }

    #[test]
    fn test_items_and_last() {
        let bytes = chain(&[b"abc", b"de", b"f"]);
        let view = IdListRef::new(&bytes);

        let items: Vec<_> = view.items().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(&items[0][CB_LEN..], b"abc");
        assert_eq!(&view.last().unwrap()[CB_LEN..], b"f");
        assert_eq!(view.byte_len(), bytes.len());
    }

    #[test]
    fn test_items_stop_at_overrun() {
        // Second record claims 40 bytes but only 3 follow
        let mut bytes = record(b"ok");
        bytes.extend_from_slice(&40u16.to_le_bytes());
        bytes.push(0xAA);

        let view = IdListRef::new(&bytes);
        assert_eq!(view.depth(), 1);
    }

    #[test]
    fn test_items_stop_at_undersized_record() {
        let bytes = [1u8, 0, 0xFF, 0xFF];
        assert_eq!(IdListRef::new(&bytes).depth(), 0);
    }

    #[test]
    fn test_from_bytes_copies_up_to_terminator() {
        let mut bytes = chain(&[b"xy"]);
        bytes.extend_from_slice(b"trailing garbage");

        let list = IdList::from_bytes(&bytes).unwrap();
        assert_eq!(list.as_bytes(), &chain(&[b"xy"])[..]);
    }

    #[test]
    fn test_from_bytes_rejects_missing_terminator() {
        let bytes = record(b"xy");
        assert!(matches!(
            IdList::from_bytes(&bytes),
            Err(Error::MalformedIdList(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_overrun() {
        let bytes = [10u8, 0, 1, 2];
        assert!(IdList::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_combine() {
        let parent = IdList::from_bytes(&chain(&[b"root", b"dir"])).unwrap();
        let child_bytes = chain(&[b"file"]);
        let child = IdListRef::new(&child_bytes);

        let full = parent.combine(child).unwrap();
        assert_eq!(full.as_bytes(), &chain(&[b"root", b"dir", b"file"])[..]);
        assert_eq!(full.view().depth(), 3);
    }

    #[test]
    fn test_combine_with_empty_parent() {
        let child_bytes = chain(&[b"file"]);
        let full = IdList::empty()
            .combine(IdListRef::new(&child_bytes))
            .unwrap();
        assert_eq!(full.as_bytes(), &child_bytes[..]);
    }

    #[test]
    fn test_try_clone_is_byte_exact() {
        let list = IdList::from_bytes(&chain(&[b"a", b"bc"])).unwrap();
        let clone = list.try_clone().unwrap();
        assert_eq!(clone, list);
    }

    #[test]
    fn test_from_raw() {
        let bytes = chain(&[b"abc", b"d"]);
        let view = unsafe { IdListRef::from_raw(bytes.as_ptr()) }.unwrap();
        assert_eq!(view.as_bytes().len(), bytes.len());
        assert!(unsafe { IdListRef::from_raw(std::ptr::null()) }.is_none());
    }

    #[test]
    fn test_from_items_rejects_bad_record() {
        let bad = [9u8, 0, 1];
        assert!(IdList::from_items([&bad[..]]).is_err());
    }
}

//! Shell identifier-list arrays (the `Shell IDList Array` drag format)
//!
//! ```text
//! u32 count
//! u32 offsets[count + 1]      relative to the start of the payload
//! ... parent list at offsets[0], child lists at offsets[1..=count]
//! ```

use byteorder::{ByteOrder, LE};

use crate::idlist::{IdList, IdListRef};
use crate::{Error, Result};

/// Name the host registers this clipboard format under
pub const FORMAT_NAME: &str = "Shell IDList Array";

const U32_LEN: usize = 4;

/// Parsed view over a shell identifier-list array
#[derive(Debug, Clone, Copy)]
pub struct Cida<'a> {
    bytes: &'a [u8],
    count: usize,
}

impl<'a> Cida<'a> {
    /// Validate the header and offset table of a payload
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < U32_LEN {
            return Err(Error::MalformedIdList("array shorter than its count".into()));
        }
        let count = LE::read_u32(bytes) as usize;

        let table_len = count
            .checked_add(1)
            .and_then(|n| n.checked_mul(U32_LEN))
            .and_then(|n| n.checked_add(U32_LEN))
            .ok_or_else(|| Error::MalformedIdList(format!("item count {} overflows", count)))?;
        if table_len > bytes.len() {
            return Err(Error::MalformedIdList(format!(
                "offset table for {} items needs {} bytes, {} available",
                count,
                table_len,
                bytes.len()
            )));
        }

        let cida = Self { bytes, count };
        for index in 0..=count {
            let offset = cida.offset(index);
            if offset < table_len || offset >= bytes.len() {
                return Err(Error::MalformedIdList(format!(
                    "offset {} of entry {} lies outside the payload",
                    offset, index
                )));
            }
        }
        Ok(cida)
    }

    fn offset(&self, index: usize) -> usize {
        LE::read_u32(&self.bytes[U32_LEN * (index + 1)..]) as usize
    }

    fn list_at(&self, index: usize) -> IdListRef<'a> {
        IdListRef::new(&self.bytes[self.offset(index)..])
    }

    /// Number of child lists
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Absolute chain of the folder the children live in
    pub fn parent(&self) -> IdListRef<'a> {
        self.list_at(0)
    }

    /// Child chains, relative to [`Cida::parent`]
    pub fn children(&self) -> impl Iterator<Item = IdListRef<'a>> + '_ {
        (1..=self.count).map(|index| self.list_at(index))
    }

    /// Each child combined with the parent into an absolute chain
    pub fn absolute_children(&self) -> Result<Vec<IdList>> {
        let parent = self.parent().to_id_list()?;
        self.children()
            .map(|child| parent.combine(child))
            .collect()
    }
}

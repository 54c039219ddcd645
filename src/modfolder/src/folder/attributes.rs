//! Capability flags reported to the shell

use bitflags::bitflags;

bitflags! {
    /// Subset of the shell's `SFGAO_*` attribute bits used by the folder
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u32 {
        const DROPTARGET = 0x0000_0100;
        const READONLY = 0x0004_0000;
        const STREAM = 0x0040_0000;
        const BROWSABLE = 0x0800_0000;
        const FOLDER = 0x2000_0000;
    }
}

bitflags! {
    /// `SHCONTF_*` enumeration flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnumFlags: u32 {
        const FOLDERS = 0x0020;
        const NONFOLDERS = 0x0040;
        const INCLUDEHIDDEN = 0x0080;
    }
}

bitflags! {
    /// `SHGDN_*` display-name flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NameFlags: u32 {
        const INFOLDER = 0x0001;
        const FOREDITING = 0x1000;
        const FORADDRESSBAR = 0x4000;
        const FORPARSING = 0x8000;
    }
}

/// The folder itself
pub const FOLDER_ATTRIBUTES: Attributes = Attributes::FOLDER
    .union(Attributes::BROWSABLE)
    .union(Attributes::DROPTARGET);

/// A module inside the folder
pub const ITEM_ATTRIBUTES: Attributes = Attributes::STREAM
    .union(Attributes::READONLY)
    .union(Attributes::DROPTARGET);

/// Attributes for a query over `item_count` items, restricted to `mask`.
/// An empty mask asks for everything.
pub fn attributes_for(item_count: usize, mask: Attributes) -> Attributes {
    let full = if item_count == 0 {
        FOLDER_ATTRIBUTES
    } else {
        ITEM_ATTRIBUTES
    };
    if mask.is_empty() {
        full
    } else {
        full & mask
    }
}

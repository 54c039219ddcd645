//! Detail columns

use bitflags::bitflags;

use crate::pidl::{file_name, ModuleRecord};

bitflags! {
    /// `SHCOLSTATE_*` flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColumnState: u32 {
        const TYPE_STR = 0x0001;
        const ONBYDEFAULT = 0x0010;
        const SECONDARYUI = 0x0040;
    }
}

/// `LVCFMT_*` text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Alignment {
    Left = 0,
    Right = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    BaseAddress,
    Size,
    Path,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Name, Column::BaseAddress, Column::Size, Column::Path];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn title(self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::BaseAddress => "Base Address",
            Column::Size => "Size",
            Column::Path => "Path",
        }
    }

    pub fn state(self) -> ColumnState {
        match self {
            Column::Path => ColumnState::TYPE_STR | ColumnState::SECONDARYUI,
            _ => ColumnState::TYPE_STR | ColumnState::ONBYDEFAULT,
        }
    }

    pub fn alignment(self) -> Alignment {
        match self {
            Column::BaseAddress | Column::Size => Alignment::Right,
            Column::Name | Column::Path => Alignment::Left,
        }
    }

    /// Default width in characters
    pub fn width(self) -> i32 {
        match self {
            Column::Name => 24,
            Column::BaseAddress => 20,
            Column::Size => 20,
            Column::Path => 60,
        }
    }

    /// Cell text for a module
    pub fn format(self, module: &ModuleRecord) -> String {
        match self {
            Column::Name => file_name(&module.path).to_string(),
            Column::BaseAddress => format!("0x{:X}", module.base_address),
            Column::Size => format!("0x{:X} ({})", module.image_size, module.image_size),
            Column::Path => module.path.clone(),
        }
    }
}

/// One `GetDetailsOf` answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Details {
    pub text: String,
    pub alignment: Alignment,
    pub width: i32,
}

impl Details {
    pub fn new(column: Column, text: String) -> Self {
        Self {
            text,
            alignment: column.alignment(),
            width: column.width(),
        }
    }
}

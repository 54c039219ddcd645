//! The module folder
//!
//! One object carries every role the shell expects from a namespace folder:
//! identity, browsing, ordering, presentation, commands and drop target. The
//! roles live in their own modules as separate `impl` blocks over
//! [`ModuleFolder`]; this module holds the shared state and the browsing and
//! presentation roles.
//!
//! All calls arrive on the shell's apartment thread, so state uses `Cell` and
//! `RefCell` rather than locks.

pub mod attributes;
pub mod columns;
pub mod commands;
pub mod compare;
pub mod drop;

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;

use tracing::{debug, info, trace, warn};

pub use attributes::{Attributes, EnumFlags, NameFlags};
pub use columns::{Column, ColumnState, Details};
pub use commands::{Command, ItemCommands, UiObject, UiRequest};
pub use drop::{DragState, DropEffect, DropFormat, DropSource};

use crate::enumerator::IdEnumerator;
use crate::host::ShellHost;
use crate::idlist::{IdList, IdListRef};
use crate::inventory::{Inventory, ModuleApi};
use crate::pidl;
use crate::refresh::RefreshSignal;
use crate::{Error, Result};

/// `SFVM_GETNOTIFY` view-callback message
pub const SFVM_GETNOTIFY: u32 = 49;

pub struct ModuleFolder<A: ModuleApi, H: ShellHost> {
    inventory: Inventory<A>,
    host: H,
    refresh: Option<RefreshSignal>,
    error_dialogs: bool,
    root: RefCell<Option<IdList>>,
    drag: Cell<DragState>,
}

impl<A: ModuleApi, H: ShellHost> ModuleFolder<A, H> {
    pub fn new(inventory: Inventory<A>, host: H) -> Self {
        Self {
            inventory,
            host,
            refresh: None,
            error_dialogs: true,
            root: RefCell::new(None),
            drag: Cell::new(DragState::default()),
        }
    }

    /// Send unload refreshes through `signal`
    pub fn with_refresh(mut self, signal: RefreshSignal) -> Self {
        self.refresh = Some(signal);
        self
    }

    /// Whether failed loads are reported to the host
    pub fn with_error_dialogs(mut self, enabled: bool) -> Self {
        self.error_dialogs = enabled;
        self
    }

    pub fn inventory(&self) -> &Inventory<A> {
        &self.inventory
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn class_id(&self) -> &'static str {
        crate::CLASS_ID
    }

    /// Store a private copy of the folder's absolute location; `None` clears it
    pub fn initialize(&self, location: Option<IdListRef<'_>>) -> Result<()> {
        let copy = match location {
            Some(list) => {
                info!("Initialized at depth {}", list.depth());
                Some(list.to_id_list()?)
            }
            None => {
                warn!("Initialized without a location");
                None
            }
        };
        self.root.replace(copy);
        Ok(())
    }

    /// Copy of the location given to [`ModuleFolder::initialize`]
    pub fn current_folder(&self) -> Result<IdList> {
        match self.root.borrow().as_ref() {
            Some(root) => root.try_clone(),
            None => {
                warn!("Current folder requested before initialization");
                Err(Error::NotInitialized)
            }
        }
    }

    /// Enumerate the modules loaded right now. `None` means "no items",
    /// either because only sub-folders were requested or because nothing
    /// is loaded.
    pub fn enumerate(&self, flags: EnumFlags) -> Result<Option<IdEnumerator>> {
        info!("Enumerate (flags {:#x})", flags.bits());
        if !flags.contains(EnumFlags::NONFOLDERS) {
            debug!("Non-folder items not requested");
            return Ok(None);
        }

        let mut items = Vec::new();
        for module in self.inventory.list_loaded_modules() {
            match module.encode() {
                Ok(item) => items.push(item),
                Err(e) => warn!("Could not encode {}: {}", module.path, e),
            }
        }

        if items.is_empty() {
            info!("Enumerate returning no items");
            return Ok(None);
        }
        info!("Enumerate returning {} items", items.len());
        Ok(Some(IdEnumerator::new(items)))
    }

    pub fn compare(&self, param: u32, a: IdListRef<'_>, b: IdListRef<'_>) -> Ordering {
        compare::compare(param, a, b)
    }

    pub fn attributes_of(&self, items: &[IdListRef<'_>], mask: Attributes) -> Attributes {
        let attrs = attributes::attributes_for(items.len(), mask);
        trace!(
            "Attributes of {} ({:#x})",
            if items.is_empty() { "folder" } else { "items" },
            attrs.bits()
        );
        attrs
    }

    /// File name of the item, or its full path when a parsing name is asked for
    pub fn display_name_of(&self, item: IdListRef<'_>, flags: NameFlags) -> Result<String> {
        let module = pidl::decode(item).ok_or(Error::ForeignItem)?;
        if flags.contains(NameFlags::FORPARSING) {
            Ok(module.path)
        } else {
            Ok(module.file_name().to_string())
        }
    }

    /// Cell text for `item` in `column`, or the column title when `item` is `None`
    pub fn details_of(&self, item: Option<IdListRef<'_>>, column: u32) -> Result<Details> {
        let column = Column::from_index(column).ok_or(Error::InvalidArgument("column"))?;
        let Some(item) = item else {
            return Ok(Details::new(column, column.title().to_string()));
        };

        let Some(module) = pidl::decode(item) else {
            warn!("Details requested for a foreign item ({:?})", column);
            return Err(Error::ForeignItem);
        };
        let text = column.format(&module);
        trace!("{:?} = {} for {}", column, text, module.path);
        Ok(Details::new(column, text))
    }

    /// Sort and display columns
    pub fn default_column(&self) -> (Column, Column) {
        (Column::Name, Column::Name)
    }

    pub fn column_state(&self, column: u32) -> Result<ColumnState> {
        Column::from_index(column)
            .map(Column::state)
            .ok_or(Error::InvalidArgument("column"))
    }

    /// View callback messages all fall through to the default handling
    pub fn view_callback(&self, message: u32) -> Result<()> {
        if message == SFVM_GETNOTIFY {
            trace!("View callback SFVM_GETNOTIFY");
        }
        Err(Error::NotImplemented)
    }

    /// Log and refuse an operation the folder does not support
    pub fn unsupported(&self, operation: &'static str) -> Error {
        debug!("{} is not supported", operation);
        Error::NotImplemented
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::recording::RecordingHost;
    use crate::inventory::mock::MockModules;
    use crate::pidl::ModuleRecord;

    pub(crate) type TestFolder = ModuleFolder<MockModules, RecordingHost>;

    pub(crate) fn folder_with(modules: Vec<ModuleRecord>) -> TestFolder {
        ModuleFolder::new(
            Inventory::new(MockModules::with_modules(modules)),
            RecordingHost::default(),
        )
    }

    fn single() -> TestFolder {
        folder_with(vec![ModuleRecord::new("C:\\a.dll", 0x10000, 0x2000)])
    }

    #[test]
    fn test_single_module_scenario() {
        let folder = single();
        let mut items = folder.enumerate(EnumFlags::NONFOLDERS).unwrap().unwrap();
        assert_eq!(items.len(), 1);

        let item = items.next().unwrap();
        let view = item.view();
        assert_eq!(folder.details_of(Some(view), 0).unwrap().text, "a.dll");
        assert_eq!(folder.details_of(Some(view), 1).unwrap().text, "0x10000");
        assert_eq!(folder.details_of(Some(view), 2).unwrap().text, "0x2000 (8192)");
        assert_eq!(folder.details_of(Some(view), 3).unwrap().text, "C:\\a.dll");
    }

    #[test]
    fn test_enumerate_without_nonfolders_skips_inventory() {
        let folder = single();
        folder.inventory().api().fail_listing();
        assert!(folder.enumerate(EnumFlags::FOLDERS).unwrap().is_none());
    }

    #[test]
    fn test_enumerate_empty_inventory() {
        let folder = folder_with(Vec::new());
        assert!(folder
            .enumerate(EnumFlags::FOLDERS | EnumFlags::NONFOLDERS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_current_folder_requires_initialize() {
        let folder = single();
        assert!(matches!(folder.current_folder(), Err(Error::NotInitialized)));

        let root = IdList::from_bytes(&[4, 0, 1, 2, 0, 0]).unwrap();
        folder.initialize(Some(root.view())).unwrap();
        assert_eq!(folder.current_folder().unwrap(), root);

        folder.initialize(None).unwrap();
        assert!(folder.current_folder().is_err());
    }

    #[test]
    fn test_display_names() {
        let folder = single();
        let item = pidl::encode("C:\\dir\\b.dll", 1, 2).unwrap();

        assert_eq!(folder.display_name_of(item.view(), NameFlags::empty()).unwrap(), "b.dll");
        assert_eq!(
            folder.display_name_of(item.view(), NameFlags::INFOLDER).unwrap(),
            "b.dll"
        );
        assert_eq!(
            folder
                .display_name_of(item.view(), NameFlags::FORPARSING | NameFlags::FORADDRESSBAR)
                .unwrap(),
            "C:\\dir\\b.dll"
        );
    }

    #[test]
    fn test_details_headers_and_rejection() {
        let folder = single();
        assert_eq!(folder.details_of(None, 1).unwrap().text, "Base Address");
        assert!(matches!(folder.details_of(None, 9), Err(Error::InvalidArgument(_))));

        let foreign = IdList::from_bytes(&[4, 0, 7, 7, 0, 0]).unwrap();
        assert!(matches!(
            folder.details_of(Some(foreign.view()), 0),
            Err(Error::ForeignItem)
        ));
        assert!(folder.display_name_of(foreign.view(), NameFlags::empty()).is_err());
    }

    #[test]
    fn test_attributes_of() {
        let folder = single();
        let item = pidl::encode("C:\\a.dll", 1, 1).unwrap();

        assert!(folder
            .attributes_of(&[], Attributes::empty())
            .contains(Attributes::FOLDER));
        assert_eq!(
            folder.attributes_of(&[item.view()], Attributes::STREAM | Attributes::FOLDER),
            Attributes::STREAM
        );
    }

    #[test]
    fn test_columns() {
        let folder = single();
        assert_eq!(folder.default_column(), (Column::Name, Column::Name));
        assert!(folder
            .column_state(3)
            .unwrap()
            .contains(ColumnState::SECONDARYUI));
        assert!(folder.column_state(4).is_err());
    }

    #[test]
    fn test_view_callback_declines() {
        let folder = single();
        assert!(matches!(folder.view_callback(SFVM_GETNOTIFY), Err(Error::NotImplemented)));
        assert!(folder.view_callback(1).is_err());
        assert!(matches!(folder.unsupported("SetNameOf"), Error::NotImplemented));
    }

    #[test]
    fn test_compare_delegates() {
        let folder = single();
        let a = pidl::encode("C:\\a.dll", 1, 1).unwrap();
        let b = pidl::encode("C:\\b.dll", 1, 1).unwrap();
        assert_eq!(folder.compare(0, a.view(), b.view()), Ordering::Less);
    }
}

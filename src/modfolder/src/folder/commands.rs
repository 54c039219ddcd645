//! Command role: UI objects for the folder and its selected items

use tracing::{debug, info, warn};

use super::ModuleFolder;
use crate::host::ShellHost;
use crate::idlist::IdListRef;
use crate::inventory::ModuleApi;
use crate::pidl::{self, ModuleRecord};
use crate::refresh::RefreshTarget;
use crate::{Error, Result};

/// Actions offered on selected modules, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reveal,
    Properties,
    Unload,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Reveal, Command::Properties, Command::Unload];

    /// Offset from the first menu identifier the shell handed out
    pub fn from_offset(offset: u32) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }

    pub fn offset(self) -> u32 {
        self as u32
    }

    /// Language-independent verb; `open` also names the default command
    pub fn from_verb(verb: &str) -> Option<Self> {
        if verb.eq_ignore_ascii_case("open") {
            return Some(Command::Reveal);
        }
        Self::ALL
            .into_iter()
            .find(|c| c.verb().eq_ignore_ascii_case(verb))
    }

    pub fn verb(self) -> &'static str {
        match self {
            Command::Reveal => "reveal",
            Command::Properties => "properties",
            Command::Unload => "unload",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::Reveal => "Open File Location",
            Command::Properties => "Properties",
            Command::Unload => "Unload Module",
        }
    }

    pub fn help_text(self) -> &'static str {
        match self {
            Command::Reveal => "Show the module in its folder.",
            Command::Properties => "Show the module's file properties.",
            Command::Unload => "Unload the selected module(s) from this process.",
        }
    }
}

/// What the shell asked `GetUIObjectOf` for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiRequest {
    DropTarget,
    ContextMenu,
    Other,
}

/// Commands scoped to a fixed set of selected modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCommands {
    items: Vec<ModuleRecord>,
}

impl ItemCommands {
    pub fn new(items: Vec<ModuleRecord>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[ModuleRecord] {
        &self.items
    }

    pub fn default_command(&self) -> Command {
        Command::Reveal
    }
}

/// Object handed back by [`ModuleFolder::ui_object_of`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiObject {
    /// The folder itself, acting as drop target
    DropTarget,
    Commands(ItemCommands),
}

impl<A: ModuleApi, H: ShellHost> ModuleFolder<A, H> {
    /// Resolve a UI-object request over the selected items. Foreign items
    /// are skipped; a selection with none of ours left fails.
    pub fn ui_object_of(&self, items: &[IdListRef<'_>], request: UiRequest) -> Result<UiObject> {
        debug!("GetUIObjectOf {} items, {:?}", items.len(), request);
        match request {
            UiRequest::DropTarget if items.is_empty() => Ok(UiObject::DropTarget),
            UiRequest::ContextMenu if !items.is_empty() => {
                let owned: Vec<ModuleRecord> = items.iter().filter_map(|i| pidl::decode(*i)).collect();
                if owned.len() < items.len() {
                    debug!("Skipped {} foreign items", items.len() - owned.len());
                }
                ItemCommands::new(owned).map(UiObject::Commands)
            }
            _ => Err(Error::NoInterface),
        }
    }

    /// Run `command` over every selected module
    pub fn invoke(&self, commands: &ItemCommands, command: Command) -> Result<()> {
        info!("Invoking {} on {} items", command.verb(), commands.items.len());
        match command {
            Command::Reveal => {
                for item in &commands.items {
                    self.host.reveal(&item.path);
                }
            }
            Command::Properties => {
                for item in &commands.items {
                    self.host.show_properties(&item.path);
                }
            }
            Command::Unload => {
                let unloaded = commands
                    .items
                    .iter()
                    .filter(|item| self.inventory.force_unload(item.base_address))
                    .count();
                if unloaded > 0 {
                    self.request_refresh();
                }
            }
        }
        Ok(())
    }

    /// Ask the shell to re-read this folder, off the calling thread
    fn request_refresh(&self) {
        let Some(signal) = &self.refresh else {
            debug!("No refresh worker, skipping refresh");
            return;
        };
        match self.root.borrow().as_ref() {
            Some(root) => signal.request(RefreshTarget::IdList(root.clone())),
            None => warn!("Refresh requested before initialization"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::tests::folder_with;
    use crate::idlist::IdList;
    use crate::refresh::{ChangeNotifier, RefreshWorker};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<RefreshTarget>>>);

    impl ChangeNotifier for Collect {
        fn notify(&self, target: &RefreshTarget) -> Result<()> {
            self.0.lock().unwrap().push(target.clone());
            Ok(())
        }
    }

    fn encoded(module: &ModuleRecord) -> IdList {
        module.encode().unwrap()
    }

    fn foreign() -> IdList {
        IdList::from_bytes(&[5, 0, 1, 2, 3, 0, 0]).unwrap()
    }

    #[test]
    fn test_command_lookup() {
        assert_eq!(Command::from_offset(2), Some(Command::Unload));
        assert_eq!(Command::from_offset(3), None);
        assert_eq!(Command::from_verb("OPEN"), Some(Command::Reveal));
        assert_eq!(Command::from_verb("properties"), Some(Command::Properties));
        assert_eq!(Command::from_verb("delete"), None);
    }

    #[test]
    fn test_drop_target_for_empty_selection() {
        let folder = folder_with(Vec::new());
        assert_eq!(folder.ui_object_of(&[], UiRequest::DropTarget).unwrap(), UiObject::DropTarget);
        assert!(matches!(
            folder.ui_object_of(&[], UiRequest::ContextMenu),
            Err(Error::NoInterface)
        ));
    }

    #[test]
    fn test_context_menu_skips_foreign_items() {
        let module = ModuleRecord::new("C:\\a.dll", 0x10000, 0x2000);
        let folder = folder_with(vec![module.clone()]);
        let ours = encoded(&module);
        let theirs = foreign();

        let object = folder
            .ui_object_of(&[theirs.view(), ours.view()], UiRequest::ContextMenu)
            .unwrap();
        let UiObject::Commands(commands) = object else {
            panic!("expected commands");
        };
        assert_eq!(commands.items(), [module]);
        assert_eq!(commands.default_command(), Command::Reveal);
    }

    #[test]
    fn test_context_menu_all_foreign_fails() {
        let folder = folder_with(Vec::new());
        let theirs = foreign();
        assert!(matches!(
            folder.ui_object_of(&[theirs.view()], UiRequest::ContextMenu),
            Err(Error::EmptySelection)
        ));
    }

    #[test]
    fn test_reveal_and_properties_go_to_host() {
        let module = ModuleRecord::new("C:\\a.dll", 0x10000, 0x2000);
        let folder = folder_with(vec![module.clone()]);
        let commands = ItemCommands::new(vec![module]).unwrap();

        folder.invoke(&commands, Command::Reveal).unwrap();
        folder.invoke(&commands, Command::Properties).unwrap();
        assert_eq!(folder.host().revealed.borrow().as_slice(), ["C:\\a.dll"]);
        assert_eq!(folder.host().properties.borrow().as_slice(), ["C:\\a.dll"]);
    }

    #[test]
    fn test_unload_requests_refresh_of_root() {
        let module = ModuleRecord::new("C:\\a.dll", 0x10000, 0x2000);
        let collect = Collect::default();
        let (signal, worker) = RefreshWorker::spawn(collect.clone()).unwrap();

        let folder = folder_with(vec![module.clone()]).with_refresh(signal);
        let root = IdList::from_bytes(&[4, 0, 9, 9, 0, 0]).unwrap();
        folder.initialize(Some(root.view())).unwrap();

        let commands = ItemCommands::new(vec![module]).unwrap();
        folder.invoke(&commands, Command::Unload).unwrap();
        assert!(!folder.inventory().api().is_loaded("C:\\a.dll"));

        drop(folder);
        worker.join();
        assert_eq!(collect.0.lock().unwrap().as_slice(), [RefreshTarget::IdList(root)]);
    }

    #[test]
    fn test_failed_unload_skips_refresh() {
        let collect = Collect::default();
        let (signal, worker) = RefreshWorker::spawn(collect.clone()).unwrap();
        let folder = folder_with(Vec::new()).with_refresh(signal);
        folder.initialize(Some(IdList::empty().view())).unwrap();

        let ghost = ModuleRecord::new("C:\\gone.dll", 0xDEAD0000, 1);
        folder
            .invoke(&ItemCommands::new(vec![ghost]).unwrap(), Command::Unload)
            .unwrap();

        drop(folder);
        worker.join();
        assert!(collect.0.lock().unwrap().is_empty());
    }
}

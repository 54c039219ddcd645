//! Drop-target role: load modules dragged onto the folder

use bitflags::bitflags;
use tracing::{debug, info, trace, warn};

use super::ModuleFolder;
use crate::cida::Cida;
use crate::host::ShellHost;
use crate::inventory::ModuleApi;

bitflags! {
    /// `DROPEFFECT_*` values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DropEffect: u32 {
        const COPY = 0x1;
        const MOVE = 0x2;
        const LINK = 0x4;
    }
}

/// Payload formats the folder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropFormat {
    /// `CF_HDROP` list of filesystem paths
    FileList,
    /// `Shell IDList Array`
    IdListArray,
}

/// What the folder needs from a drag payload
pub trait DropSource {
    fn offers(&self, format: DropFormat) -> bool;

    /// Paths from the file-list format, if present
    fn file_list(&self) -> Option<Vec<String>>;

    /// Raw bytes of the identifier-list array format, if present
    fn id_list_array(&self) -> Option<Vec<u8>>;
}

/// Hover state between `DragEnter` and `DragLeave`/`Drop`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragState {
    pub acceptable: bool,
    pub last_effect: DropEffect,
}

/// Effect to report for a payload offering `allowed`. Modules are never
/// moved: copy wins, link is the fallback.
pub fn negotiate(allowed: DropEffect) -> DropEffect {
    if allowed.contains(DropEffect::COPY) {
        DropEffect::COPY
    } else if allowed.contains(DropEffect::LINK) {
        DropEffect::LINK
    } else {
        DropEffect::empty()
    }
}

fn supports(source: &dyn DropSource) -> bool {
    source.offers(DropFormat::FileList) || source.offers(DropFormat::IdListArray)
}

/// Filesystem paths carried by a payload: the file list when present,
/// otherwise each array child combined with its parent and resolved by the host
pub fn extract_paths(source: &dyn DropSource, host: &dyn ShellHost) -> Vec<String> {
    if let Some(paths) = source.file_list() {
        info!("File list carries {} paths", paths.len());
        return paths;
    }

    let Some(bytes) = source.id_list_array() else {
        return Vec::new();
    };
    let children = match Cida::parse(&bytes).and_then(|cida| cida.absolute_children()) {
        Ok(children) => children,
        Err(e) => {
            warn!("Unreadable identifier-list array: {}", e);
            return Vec::new();
        }
    };
    info!("Identifier-list array carries {} items", children.len());

    children
        .iter()
        .filter_map(|child| {
            let path = host.resolve_id_list(child.view());
            if path.is_none() {
                debug!("Dropped item has no filesystem path");
            }
            path
        })
        .collect()
}

impl<A: ModuleApi, H: ShellHost> ModuleFolder<A, H> {
    pub fn drag_state(&self) -> DragState {
        self.drag.get()
    }

    pub fn drag_enter(&self, source: &dyn DropSource, allowed: DropEffect) -> DropEffect {
        let acceptable = supports(source);
        let effect = if acceptable {
            negotiate(allowed)
        } else {
            DropEffect::empty()
        };
        info!(
            "DragEnter {} (allowed {:?}, effect {:?})",
            if acceptable { "accepted" } else { "rejected" },
            allowed,
            effect
        );
        self.drag.set(DragState {
            acceptable,
            last_effect: effect,
        });
        effect
    }

    pub fn drag_over(&self, allowed: DropEffect) -> DropEffect {
        let mut state = self.drag.get();
        let effect = if state.acceptable {
            negotiate(allowed)
        } else {
            DropEffect::empty()
        };
        if effect == state.last_effect {
            trace!("DragOver effect unchanged: {:?}", effect);
        } else {
            debug!("DragOver effect {:?} -> {:?}", state.last_effect, effect);
        }
        state.last_effect = effect;
        self.drag.set(state);
        effect
    }

    pub fn drag_leave(&self) {
        debug!("DragLeave");
        self.drag.set(DragState::default());
    }

    /// Load every module in the payload that is not loaded yet. Returns the
    /// effect to report back and the number of modules loaded.
    pub fn drop_data(&self, source: &dyn DropSource, allowed: DropEffect) -> (DropEffect, usize) {
        let effect = if supports(source) {
            negotiate(allowed)
        } else {
            DropEffect::empty()
        };
        self.drag.set(DragState::default());
        if effect.is_empty() {
            info!("Drop rejected");
            return (effect, 0);
        }

        let paths = extract_paths(source, &self.host);
        info!("Drop received {} paths", paths.len());

        let loaded = self.inventory.load_if_absent(&paths, |path, code| {
            if self.error_dialogs {
                self.host.report_load_failure(path, code);
            } else {
                debug!("Load failure dialog suppressed for {}", path);
            }
        });
        (effect, loaded)
    }
}

//! Mock Module API
//!
//! In-memory module table with reference counts, for exercising the inventory
//! and the folder without touching the real loader.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::{ModuleApi, ModuleRecord};
use crate::{Error, Result};

struct Entry {
    record: ModuleRecord,
    references: usize,
}

/// A mock loader for testing
#[derive(Default)]
pub struct MockModules {
    entries: RefCell<Vec<Entry>>,
    load_failures: RefCell<HashMap<String, u32>>,
    pinned: RefCell<HashSet<u64>>,
    listing_fails: Cell<bool>,
    next_base: Cell<u64>,
    load_calls: Cell<usize>,
    release_calls: Cell<usize>,
}

impl MockModules {
    /// Table with each module holding a single reference
    pub fn with_modules(modules: Vec<ModuleRecord>) -> Self {
        let mock = Self::default();
        mock.entries.replace(
            modules
                .into_iter()
                .map(|record| Entry {
                    record,
                    references: 1,
                })
                .collect(),
        );
        mock
    }

    pub fn add_reference(&self, base_address: u64) {
        for entry in self.entries.borrow_mut().iter_mut() {
            if entry.record.base_address == base_address {
                entry.references += 1;
            }
        }
    }

    /// Module that never drops below one reference
    pub fn pin(&self, base_address: u64) {
        self.pinned.borrow_mut().insert(base_address);
    }

    pub fn fail_load(&self, path: &str, code: u32) {
        self.load_failures
            .borrow_mut()
            .insert(path.to_string(), code);
    }

    pub fn fail_listing(&self) {
        self.listing_fails.set(true);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.get()
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.get()
    }
}

impl ModuleApi for MockModules {
    fn modules(&self) -> Result<Vec<ModuleRecord>> {
        if self.listing_fails.get() {
            return Err(Error::os("EnumProcessModules", 299));
        }
        Ok(self
            .entries
            .borrow()
            .iter()
            .map(|e| e.record.clone())
            .collect())
    }

    fn is_loaded(&self, path: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.record.path.eq_ignore_ascii_case(path))
    }

    fn load(&self, path: &str) -> Result<u64> {
        self.load_calls.set(self.load_calls.get() + 1);
        if let Some(&code) = self.load_failures.borrow().get(path) {
            return Err(Error::os("LoadLibrary", code));
        }

        let base = 0x7000_0000 + self.next_base.get() * 0x10_0000;
        self.next_base.set(self.next_base.get() + 1);
        self.entries.borrow_mut().push(Entry {
            record: ModuleRecord::new(path, base, 0x1000),
            references: 1,
        });
        Ok(base)
    }

    fn release(&self, base_address: u64) -> Result<()> {
        self.release_calls.set(self.release_calls.get() + 1);
        if self.pinned.borrow().contains(&base_address) {
            return Ok(());
        }

        let mut entries = self.entries.borrow_mut();
        let index = entries
            .iter()
            .position(|e| e.record.base_address == base_address)
            .ok_or_else(|| Error::os("FreeLibrary", 126))?;

        entries[index].references -= 1;
        if entries[index].references == 0 {
            entries.remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reference_counting() {
        let mock = MockModules::with_modules(vec![ModuleRecord::new("C:\\a.dll", 0x1000, 1)]);
        mock.add_reference(0x1000);

        assert!(mock.release(0x1000).is_ok());
        assert!(mock.is_loaded("C:\\a.dll"));
        assert!(mock.release(0x1000).is_ok());
        assert!(!mock.is_loaded("C:\\a.dll"));
        assert!(mock.release(0x1000).is_err());
    }

    #[test]
    fn test_mock_load_assigns_distinct_bases() {
        let mock = MockModules::default();
        let a = mock.load("C:\\a.dll").unwrap();
        let b = mock.load("C:\\b.dll").unwrap();
        assert_ne!(a, b);
        assert_eq!(mock.modules().unwrap().len(), 2);
        assert_eq!(mock.load_calls(), 2);
    }
}

//! Module inventory commands
//!
//! These run against the CLI's own process, the same way the shell server
//! sees the process it is loaded into.

use std::path::PathBuf;

use anyhow::{bail, Result};
use modfolder::folder::Column;
use modfolder::host::load_failure_message;
use modfolder::{Inventory, ModuleRecord};

/// Render modules with the folder's own column layout
pub fn format_table(modules: &[ModuleRecord]) -> String {
    let mut out = String::new();
    for column in Column::ALL {
        out.push_str(&format!("{:<width$} ", column.title(), width = column.width() as usize));
    }
    out.push('\n');

    for module in modules {
        for column in Column::ALL {
            out.push_str(&format!(
                "{:<width$} ",
                column.format(module),
                width = column.width() as usize
            ));
        }
        out.push('\n');
    }
    out
}

fn print_modules(modules: &[ModuleRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(modules)?);
    } else {
        print!("{}", format_table(modules));
        println!("{} modules", modules.len());
    }
    Ok(())
}

/// List the modules mapped into this process
pub fn list(json: bool) -> Result<()> {
    let modules = Inventory::native().list_loaded_modules();
    print_modules(&modules, json)
}

/// Load every path that is not mapped yet
pub fn load(paths: &[PathBuf], list_after: bool) -> Result<()> {
    let inventory = Inventory::native();
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();

    let mut failures = 0usize;
    let loaded = inventory.load_if_absent(&paths, |path, code| {
        eprintln!("{}", load_failure_message(path, code));
        failures += 1;
    });
    println!("Loaded {} of {} modules", loaded, paths.len());

    if list_after {
        print_modules(&inventory.list_loaded_modules(), false)?;
    }
    if failures > 0 {
        bail!("{} module(s) failed to load", failures);
    }
    Ok(())
}

/// Drop every reference to the module mapped at `address`
pub fn unload(address: &str, limit: usize) -> Result<()> {
    let base = super::parse_hex(address)?;
    let inventory = Inventory::native().with_unload_attempt_limit(limit);

    if !inventory.force_unload(base) {
        bail!("No module was unloaded at {:#X}", base);
    }
    println!("Unloaded module at {:#X}", base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        let modules = vec![
            ModuleRecord::new("C:\\a.dll", 0x10000, 0x2000),
            ModuleRecord::new("/usr/lib/libz.so.1", 0x7F00_0000_0000, 0x1000),
        ];
        let table = format_table(&modules);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Name"));
        assert!(lines[0].contains("Base Address"));
        assert!(lines[1].starts_with("a.dll"));
        assert!(lines[1].contains("0x10000"));
        assert!(lines[1].contains("0x2000 (8192)"));
        assert!(lines[2].starts_with("libz.so.1"));
        assert!(lines[2].contains("0x7F0000000000"));
    }

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&[]).lines().count(), 1);
    }

    #[test]
    fn test_unload_rejects_bad_address() {
        assert!(unload("not-hex", 1).is_err());
    }
}

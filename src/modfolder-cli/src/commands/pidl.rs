//! Item identifier commands

use anyhow::{bail, Context, Result};
use modfolder::{pidl, IdListRef, ModuleRecord};

/// Hex form of the identifier for a module record
pub fn encode_hex(path: &str, base: &str, size: &str) -> Result<String> {
    let base = super::parse_hex(base)?;
    let size = super::parse_number(size)?;
    let size = u32::try_from(size).with_context(|| format!("Image size too large: {}", size))?;

    let list = pidl::encode(path, base, size).context("Failed to encode identifier")?;
    Ok(hex::encode(list.as_bytes()))
}

/// Module record carried by a hex identifier
pub fn decode_hex(text: &str) -> Result<ModuleRecord> {
    let compact: String = text.split_whitespace().collect();
    let bytes = hex::decode(&compact).context("Identifier is not valid hex")?;

    match pidl::decode(IdListRef::new(&bytes)) {
        Some(record) => Ok(record),
        None => bail!("Not a module identifier ({} bytes)", bytes.len()),
    }
}

pub fn encode(path: &str, base: &str, size: &str) -> Result<()> {
    println!("{}", encode_hex(path, base, size)?);
    Ok(())
}

pub fn decode(text: &str, json: bool) -> Result<()> {
    let record = decode_hex(text)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Path:         {}", record.path);
        println!("Name:         {}", record.file_name());
        println!("Base address: {:#X}", record.base_address);
        println!("Image size:   {:#X} ({})", record.image_size, record.image_size);
    }
    Ok(())
}

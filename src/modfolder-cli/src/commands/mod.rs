//! Command handlers for modfolder CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod configure;
pub mod modules;
pub mod pidl;
pub mod server;

use anyhow::{Context, Result};

/// Parse a hex number, with or without a `0x` prefix
pub fn parse_hex(text: &str) -> Result<u64> {
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex number: {}", text))
}

/// Parse a decimal number, or a hex one when prefixed with `0x`
pub fn parse_number(text: &str) -> Result<u64> {
    let text = text.trim();
    if text.starts_with("0x") || text.starts_with("0X") {
        parse_hex(text)
    } else {
        text.parse()
            .with_context(|| format!("Invalid number: {}", text))
    }
}

//! Human readable sizes and addresses
//!
//! Partition tables and descriptors spell sizes like `"128K"` or `"2M"`
//! and addresses as hex strings.

use std::format;
use std::string::{String, ToString};

use crate::{Error, Result};

const KIB: u32 = 1024;
const MIB: u32 = 1024 * 1024;

/// Suffixes accepted by [`parse_size`], longest match first
const SUFFIXES: &[(&str, u32)] = &[
    ("mib", MIB),
    ("mb", MIB),
    ("m", MIB),
    ("kib", KIB),
    ("kb", KIB),
    ("k", KIB),
    ("b", 1),
];

/// Parse a size string like "128K", "2M", "4096" or "0x1000"
pub fn parse_size(s: &str) -> Result<u32> {
    let s = s.trim();
    let invalid = || Error::InvalidNumber(s.to_string());

    // Try plain number first
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    // Try hex
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|_| invalid());
    }

    // Try with suffix
    let lower = s.to_lowercase();
    let (num_str, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| lower.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
        .ok_or_else(invalid)?;

    let num: u32 = num_str.parse().map_err(|_| invalid())?;
    num.checked_mul(multiplier).ok_or_else(invalid)
}

/// Format a size the way descriptors expect it ("128K")
pub fn format_size(size: u32) -> String {
    if size % KIB == 0 {
        format!("{}K", size / KIB)
    } else {
        format!("{}", size)
    }
}

/// Parse a hex number with or without `0x` prefix (table offsets)
pub fn parse_hex(s: &str) -> Result<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidNumber(s.to_string()))
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| Error::InvalidNumber(s.to_string()))
    } else {
        s.parse().map_err(|_| Error::InvalidNumber(s.to_string()))
    }
}

/// Format an address the way descriptors expect it ("0x00011000")
pub fn format_addr(addr: u32) -> String {
    format!("0x{:08x}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4K").unwrap(), 4096);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("68KB").unwrap(), 68 * 1024);
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size(" 16MiB ").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("12b").unwrap(), 12);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("K").is_err());
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("8192M").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(131072), "128K");
        assert_eq!(format_size(0x220000), "2176K");
        assert_eq!(format_size(100), "100");
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x11000").unwrap(), 0x11000);
        assert_eq!(parse_hex("11000").unwrap(), 0x11000);
        assert!(parse_hex("0xZZ").is_err());
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(format_addr(0x11000), "0x00011000");
    }
}

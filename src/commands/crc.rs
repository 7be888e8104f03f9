//! CRC block codec and address translation commands

use bkpack_core::address::{is_valid_physical, physical, virtual_addr};
use bkpack_core::codec::{crc_decode, crc_encode};
use bkpack_core::output::{read_required, write_atomic};
use std::path::Path;

/// Insert a CRC-16 after every 32 data bytes
pub fn cmd_encode(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_required("input", input)?;
    let encoded = crc_encode(&data);
    write_atomic(output, &encoded)?;
    println!(
        "Encoded {} bytes into {} bytes at {}",
        data.len(),
        encoded.len(),
        output.display()
    );
    Ok(())
}

/// Verify and strip the per-block CRC-16
pub fn cmd_decode(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_required("input", input)?;
    let decoded = crc_decode(&data)?;
    write_atomic(output, &decoded)?;
    println!(
        "Decoded {} bytes into {} bytes at {}",
        data.len(),
        decoded.len(),
        output.display()
    );
    Ok(())
}

/// Print the translation of one address
pub fn cmd_addr(address: u32, to_virtual: bool) {
    if to_virtual {
        if !is_valid_physical(address) {
            log::warn!("{:#010x} falls on a CRC byte", address);
        }
        println!("physical {:#010x} -> virtual {:#010x}", address, virtual_addr(address));
    } else {
        println!("virtual {:#010x} -> physical {:#010x}", address, physical(address));
    }
}

//! CRC primitives
//!
//! Two independent, stateless checksums:
//!
//! - [`crc16`] protects every 32-byte block of CRC-encoded flash. It is
//!   CRC-16/CMS (poly 0x8005, init 0xFFFF, no reflection, no final xor) and
//!   is stored big-endian right after the block it covers.
//! - [`crc32`] protects each OTA partition record. It is the IEEE 802.3
//!   CRC-32 (the zlib one) and is stored little-endian.

use crc::{Algorithm, Crc};

/// CRC-16 algorithm used by the flash controller for block protection
pub const FLASH_CRC16: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0xFFFF,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0xAEE7,
    residue: 0x0000,
};

const CRC16: Crc<u16> = Crc::<u16>::new(&FLASH_CRC16);

/// Compute the block checksum of `data`
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Compute the record checksum of `data`
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

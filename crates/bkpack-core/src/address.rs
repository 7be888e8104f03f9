//! Logical / physical flash address translation
//!
//! With CRC protection enabled the flash controller stores every 32 data
//! bytes as a 34-byte physical block (data followed by a CRC-16). Code runs
//! from the logical (virtual) view, while partition tables, the packager and
//! the AB swap logic work on raw physical addresses.
//!
//! ```text
//! physical(v) = (v >> 5) * 34 + (v & 31)
//! virtual(p)  = (p / 34) * 32 + (p % 34)
//! ```
//!
//! All functions work on 32-bit flash offsets; callers are expected to stay
//! well below 4 GiB.

/// Data bytes per CRC block
pub const LOGICAL_BLOCK_SIZE: u32 = 32;

/// Physical bytes per CRC block (data + 2-byte checksum)
pub const PHYSICAL_BLOCK_SIZE: u32 = 34;

/// Size of the checksum appended to each block
pub const CRC_SIZE: u32 = PHYSICAL_BLOCK_SIZE - LOGICAL_BLOCK_SIZE;

/// Alignment executable partitions need when CRC mode is on
pub const CRC_PARTITION_ALIGN: u32 = PHYSICAL_BLOCK_SIZE * 1024;

/// Translate a logical address to its physical location
pub const fn physical(addr: u32) -> u32 {
    (addr >> 5) * PHYSICAL_BLOCK_SIZE + (addr & (LOGICAL_BLOCK_SIZE - 1))
}

/// Translate a physical address back to the logical view
///
/// Only meaningful for addresses that hold data, see [`is_valid_physical`].
pub const fn virtual_addr(addr: u32) -> u32 {
    (addr / PHYSICAL_BLOCK_SIZE) * LOGICAL_BLOCK_SIZE + (addr % PHYSICAL_BLOCK_SIZE)
}

/// Check whether a physical address points at data rather than a checksum
pub const fn is_valid_physical(addr: u32) -> bool {
    addr % PHYSICAL_BLOCK_SIZE < LOGICAL_BLOCK_SIZE
}

/// Round a physical address up to the next block boundary
pub const fn ceil_align_physical(addr: u32) -> u32 {
    addr.div_ceil(PHYSICAL_BLOCK_SIZE) * PHYSICAL_BLOCK_SIZE
}

/// Scale a physical size (or block-aligned start) down to logical bytes
pub const fn physical_size_to_logical(size: u32) -> u32 {
    ((size as u64 * LOGICAL_BLOCK_SIZE as u64) / PHYSICAL_BLOCK_SIZE as u64) as u32
}

/// Number of physical bytes needed to store `size` logical bytes
pub const fn logical_size_to_physical(size: u32) -> u32 {
    size.div_ceil(LOGICAL_BLOCK_SIZE) * PHYSICAL_BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical() {
        assert_eq!(physical(0), 0);
        assert_eq!(physical(31), 31);
        assert_eq!(physical(32), 34);
        assert_eq!(physical(0x8000), 0x8800);
    }

    #[test]
    fn test_virtual() {
        assert_eq!(virtual_addr(0), 0);
        assert_eq!(virtual_addr(34), 32);
        assert_eq!(virtual_addr(0x8800), 0x8000);
        assert_eq!(virtual_addr(CRC_PARTITION_ALIGN), 32 * 1024);
    }

    #[test]
    fn test_round_trip_block_aligned() {
        for v in (0..0x20000u32).step_by(32) {
            assert_eq!(virtual_addr(physical(v)), v);
        }
        assert_eq!(virtual_addr(physical(0x00FF_FFE0)), 0x00FF_FFE0);
    }

    #[test]
    fn test_checksum_bytes_are_invalid() {
        assert!(is_valid_physical(0));
        assert!(is_valid_physical(31));
        assert!(!is_valid_physical(32));
        assert!(!is_valid_physical(33));
        assert!(is_valid_physical(34));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ceil_align_physical(0), 0);
        assert_eq!(ceil_align_physical(1), 34);
        assert_eq!(ceil_align_physical(68), 68);
        assert_eq!(physical_size_to_logical(CRC_PARTITION_ALIGN), 32 * 1024);
        assert_eq!(logical_size_to_physical(40), 68);
        assert_eq!(logical_size_to_physical(32 * 1024), CRC_PARTITION_ALIGN);
    }
}

//! Physical (CRC-protected) encoding
//!
//! Flash controllers with CRC enabled store every 32 logical bytes as a
//! 34-byte physical block: the data followed by its CRC-16, high byte
//! first. A short final block is padded with `0xFF` before checksumming.

use std::vec::Vec;

use crate::address::{LOGICAL_BLOCK_SIZE, PHYSICAL_BLOCK_SIZE};
use crate::crc::crc16;
use crate::{Error, Result};

const DATA_LEN: usize = LOGICAL_BLOCK_SIZE as usize;
const BLOCK_LEN: usize = PHYSICAL_BLOCK_SIZE as usize;

/// Length of the physical encoding of `len` logical bytes
pub const fn encoded_len(len: usize) -> usize {
    len.div_ceil(DATA_LEN) * BLOCK_LEN
}

/// Encode logical bytes into CRC-protected physical blocks
pub fn crc_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(data.len()));
    for chunk in data.chunks(DATA_LEN) {
        let mut block = [0xFFu8; DATA_LEN];
        block[..chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&block);
        out.extend_from_slice(&crc16(&block).to_be_bytes());
    }
    out
}

/// Verify and strip the checksums of physical blocks
///
/// The padding of a short final block cannot be told apart from data, so
/// the result is always a multiple of 32 bytes.
pub fn crc_decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % BLOCK_LEN != 0 {
        return Err(Error::TruncatedBlock(data.len()));
    }

    let mut out = Vec::with_capacity(data.len() / BLOCK_LEN * DATA_LEN);
    for (i, block) in data.chunks_exact(BLOCK_LEN).enumerate() {
        let (payload, crc) = block.split_at(DATA_LEN);
        let stored = u16::from_be_bytes([crc[0], crc[1]]);
        if crc16(payload) != stored {
            return Err(Error::CrcMismatch {
                offset: i * BLOCK_LEN,
            });
        }
        out.extend_from_slice(payload);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    #[test]
    fn test_encode_vector() {
        let encoded = crc_encode(&[0u8; 40]);
        assert_eq!(encoded.len(), 68);

        let mut expected = vec![0u8; 32];
        expected.extend_from_slice(&[0x80, 0x29]);
        expected.extend_from_slice(&[0u8; 8]);
        expected.extend_from_slice(&[0xFF; 24]);
        expected.extend_from_slice(&[0xAC, 0xE7]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(1), 34);
        assert_eq!(encoded_len(32), 34);
        assert_eq!(encoded_len(33), 68);
        assert!(crc_encode(&[]).is_empty());
    }

    #[test]
    fn test_decode() {
        let data: Vec<u8> = (0..64u8).collect();
        let encoded = crc_encode(&data);
        assert_eq!(crc_decode(&encoded).unwrap(), data);

        let padded = crc_decode(&crc_encode(&[0u8; 40])).unwrap();
        assert_eq!(padded.len(), 64);
        assert!(padded[40..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_decode_errors() {
        let mut encoded = crc_encode(&[0x5Au8; 64]);
        assert!(matches!(
            crc_decode(&encoded[..50]),
            Err(Error::TruncatedBlock(50))
        ));

        encoded[40] ^= 0x80;
        assert!(matches!(
            crc_decode(&encoded),
            Err(Error::CrcMismatch { offset: 34 })
        ));
    }
}

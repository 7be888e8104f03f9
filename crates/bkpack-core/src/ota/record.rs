//! OTA partition record wire format
//!
//! The bootloader finds its partition layout in a blob of fixed 64-byte
//! records appended to its own image:
//!
//! ```text
//! offset  size  field
//!      0     4  magic       0x45503130, little endian
//!      4    24  name        NUL padded
//!     28    24  flash_name  NUL padded
//!     52     4  offset      little endian
//!     56     4  size        little endian
//!     60     4  crc32       over bytes 0..60, little endian
//! ```
//!
//! Each record is checksummed on its own; nothing chains between records.

use core::fmt;

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::crc::crc32;

/// Record magic
pub const OTA_RECORD_MAGIC: u32 = 0x4550_3130;

/// Size of one encoded record
pub const OTA_RECORD_SIZE: usize = 64;

/// Capacity of the name fields
pub const OTA_NAME_LEN: usize = 24;

const CRC_COVERED: usize = OTA_RECORD_SIZE - 4;

/// One entry of the bootloader attach table
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct OtaRecord {
    magic: U32<LittleEndian>,
    name: [u8; OTA_NAME_LEN],
    flash_name: [u8; OTA_NAME_LEN],
    offset: U32<LittleEndian>,
    size: U32<LittleEndian>,
    crc: U32<LittleEndian>,
}

/// Errors produced while encoding or decoding records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// A name does not fit into its 24-byte field
    NameTooLong {
        /// Length of the rejected name in bytes
        len: usize,
    },
    /// Record does not start with the expected magic
    BadMagic(u32),
    /// Stored checksum does not match the record contents
    BadCrc {
        /// Checksum stored in the record
        stored: u32,
        /// Checksum computed over the record
        computed: u32,
    },
    /// Blob length is not a whole number of records
    Truncated(usize),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameTooLong { len } => write!(
                f,
                "name of {} bytes exceeds the {} byte field",
                len, OTA_NAME_LEN
            ),
            Self::BadMagic(magic) => write!(f, "bad record magic 0x{:08x}", magic),
            Self::BadCrc { stored, computed } => write!(
                f,
                "record crc mismatch: stored 0x{:08x}, computed 0x{:08x}",
                stored, computed
            ),
            Self::Truncated(len) => write!(
                f,
                "blob length {} is not a multiple of {}",
                len, OTA_RECORD_SIZE
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecordError {}

fn encode_name(name: &str) -> Result<[u8; OTA_NAME_LEN], RecordError> {
    let bytes = name.as_bytes();
    if bytes.len() > OTA_NAME_LEN {
        return Err(RecordError::NameTooLong { len: bytes.len() });
    }
    let mut field = [0u8; OTA_NAME_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

fn decode_name(field: &[u8; OTA_NAME_LEN]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..end]).unwrap_or("")
}

impl OtaRecord {
    /// Build a record and seal it with its checksum
    pub fn new(name: &str, flash_name: &str, offset: u32, size: u32) -> Result<Self, RecordError> {
        let mut record = Self {
            magic: OTA_RECORD_MAGIC.into(),
            name: encode_name(name)?,
            flash_name: encode_name(flash_name)?,
            offset: offset.into(),
            size: size.into(),
            crc: 0.into(),
        };
        record.crc = record.compute_crc().into();
        Ok(record)
    }

    /// Decode and verify a record from the first 64 bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self, RecordError> {
        let record = bytes
            .get(..OTA_RECORD_SIZE)
            .and_then(|b| Self::read_from_bytes(b).ok())
            .ok_or(RecordError::Truncated(bytes.len()))?;

        if record.magic.get() != OTA_RECORD_MAGIC {
            return Err(RecordError::BadMagic(record.magic.get()));
        }
        let computed = record.compute_crc();
        if computed != record.crc.get() {
            return Err(RecordError::BadCrc {
                stored: record.crc.get(),
                computed,
            });
        }
        Ok(record)
    }

    /// Iterate over the records of an attach-table blob
    pub fn parse_blob(
        blob: &[u8],
    ) -> Result<impl Iterator<Item = Result<Self, RecordError>> + '_, RecordError> {
        if blob.len() % OTA_RECORD_SIZE != 0 {
            return Err(RecordError::Truncated(blob.len()));
        }
        Ok(blob.chunks_exact(OTA_RECORD_SIZE).map(Self::parse))
    }

    fn compute_crc(&self) -> u32 {
        crc32(&self.as_bytes()[..CRC_COVERED])
    }

    /// Partition name
    pub fn name(&self) -> &str {
        decode_name(&self.name)
    }

    /// Flash device name
    pub fn flash_name(&self) -> &str {
        decode_name(&self.flash_name)
    }

    /// Partition start
    pub fn offset(&self) -> u32 {
        self.offset.get()
    }

    /// Partition length
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    /// Stored checksum
    pub fn crc(&self) -> u32 {
        self.crc.get()
    }
}

impl fmt::Debug for OtaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtaRecord")
            .field("name", &self.name())
            .field("flash_name", &self.flash_name())
            .field("offset", &format_args!("0x{:08x}", self.offset()))
            .field("size", &format_args!("0x{:x}", self.size()))
            .field("crc", &format_args!("0x{:08x}", self.crc()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(core::mem::size_of::<OtaRecord>(), OTA_RECORD_SIZE);
    }

    #[test]
    fn test_encode_bootloader_record() {
        let record = OtaRecord::new("bootloader", "beken_onchip_crc", 0, 0x11000).unwrap();
        let bytes = record.as_bytes();

        assert_eq!(&bytes[0..4], &[0x30, 0x31, 0x50, 0x45]);
        assert_eq!(&bytes[4..14], b"bootloader");
        assert!(bytes[14..28].iter().all(|&b| b == 0));
        assert_eq!(&bytes[28..44], b"beken_onchip_crc");
        assert_eq!(&bytes[52..56], &[0, 0, 0, 0]);
        assert_eq!(&bytes[56..60], &[0x00, 0x10, 0x01, 0x00]);
        assert_eq!(record.crc(), 0x569B_B6DF);
        assert_eq!(&bytes[60..64], &[0xDF, 0xB6, 0x9B, 0x56]);
    }

    #[test]
    fn test_crc_is_per_record() {
        let app = OtaRecord::new("app", "beken_onchip_crc", 0x11000, 0x220000).unwrap();
        assert_eq!(app.crc(), 0x7730_6B37);
    }

    #[test]
    fn test_name_limits() {
        let full = "abcdefghijklmnopqrstuvwx";
        let record = OtaRecord::new(full, "beken_onchip", 0, 0x1000).unwrap();
        assert_eq!(record.name(), full);

        assert_eq!(
            OtaRecord::new("abcdefghijklmnopqrstuvwxy", "beken_onchip", 0, 0),
            Err(RecordError::NameTooLong { len: 25 })
        );
    }

    #[test]
    fn test_parse_rejects_corruption() {
        let record = OtaRecord::new("download", "beken_onchip", 0x3000, 0x1000).unwrap();
        let mut bytes = [0u8; OTA_RECORD_SIZE];
        bytes.copy_from_slice(record.as_bytes());

        let parsed = OtaRecord::parse(&bytes).unwrap();
        assert_eq!(parsed.name(), "download");
        assert_eq!(parsed.offset(), 0x3000);

        bytes[53] ^= 0x01;
        assert!(matches!(
            OtaRecord::parse(&bytes),
            Err(RecordError::BadCrc { .. })
        ));

        bytes[0] = 0;
        assert!(matches!(
            OtaRecord::parse(&bytes),
            Err(RecordError::BadMagic(_))
        ));
    }

    #[test]
    fn test_parse_blob() {
        let a = OtaRecord::new("bootloader", "beken_onchip_crc", 0, 0x11000).unwrap();
        let b = OtaRecord::new("app", "beken_onchip_crc", 0x11000, 0x220000).unwrap();
        let mut blob = [0u8; 2 * OTA_RECORD_SIZE];
        blob[..OTA_RECORD_SIZE].copy_from_slice(a.as_bytes());
        blob[OTA_RECORD_SIZE..].copy_from_slice(b.as_bytes());

        let mut records = OtaRecord::parse_blob(&blob).unwrap();
        assert_eq!(records.next().unwrap().unwrap().name(), "bootloader");
        assert_eq!(records.next().unwrap().unwrap().name(), "app");
        assert!(records.next().is_none());

        assert!(matches!(
            OtaRecord::parse_blob(&blob[..70]),
            Err(RecordError::Truncated(70))
        ));
    }
}

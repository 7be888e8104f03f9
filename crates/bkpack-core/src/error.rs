//! Error types for bkpack-core
//!
//! Every failure in the pipeline is fatal: inputs are static, so retrying
//! reproduces the same error. Each variant belongs to one [`ErrorKind`] and
//! carries enough context (path, partition, line) to point at the culprit.

use std::io;
use std::path::{Path, PathBuf};
use std::string::String;

use thiserror::Error;

use crate::ota::RecordError;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required file or directory is absent
    ConfigMissing,
    /// Malformed table, JSON or TOML input
    Parse,
    /// Input parsed fine but violates a layout constraint
    Validation,
    /// Filesystem failure
    Io,
}

/// bkpack error type
#[derive(Debug, Error)]
pub enum Error {
    /// Required input path does not exist
    #[error("{what} {} not exist.", path.display())]
    ConfigMissing {
        /// Human name of the missing input
        what: &'static str,
        /// Path that was looked up
        path: PathBuf,
    },

    /// Malformed partition table line
    #[error("auto partition table format error, line {line}: {message}")]
    Table {
        /// 1-based line number in the source table
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Unparseable size or address literal
    #[error("invalid size or address: {0}")]
    InvalidNumber(String),

    /// Malformed JSON document
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        /// Document path (or a placeholder for in-memory input)
        path: PathBuf,
        /// Underlying parser error
        #[source]
        source: serde_json::Error,
    },

    /// Malformed TOML project configuration
    #[error("invalid project configuration {}: {source}", path.display())]
    Toml {
        /// Configuration path
        path: PathBuf,
        /// Underlying parser error
        #[source]
        source: toml::de::Error,
    },

    /// Offset or size not aligned to what the partition requires
    #[error("{name} partition align error")]
    Alignment {
        /// Partition name
        name: String,
    },

    /// Zero-sized partition
    #[error("{name} partition size is zero")]
    EmptyPartition {
        /// Partition name
        name: String,
    },

    /// Two partitions share flash space
    #[error("partition table config overlaps: {first} and {second}")]
    Overlap {
        /// First partition of the colliding pair
        first: String,
        /// Second partition of the colliding pair
        second: String,
    },

    /// Two partitions share a name
    #[error("duplicate partition name {name}")]
    DuplicateName {
        /// Partition name
        name: String,
    },

    /// Two partition names render to the same header macro
    #[error("{first} and {second} map to the same header macro {macro_name}")]
    MacroCollision {
        /// Earlier partition
        first: String,
        /// Later partition
        second: String,
        /// Shared macro fragment
        macro_name: String,
    },

    /// Partition extends past the end of flash
    #[error("{name} partition out of flash size")]
    OutOfFlash {
        /// Partition name
        name: String,
    },

    /// A mandatory partition is missing from the table
    #[error("{name} is not exists")]
    MissingPartition {
        /// Partition name
        name: String,
    },

    /// A mandatory partition sits at the wrong table position
    #[error("{name} index error")]
    IndexMismatch {
        /// Partition name
        name: String,
    },

    /// Package sections overlap
    #[error("partition exist overlaps!")]
    SectionOverlap,

    /// Firmware binary does not fit its partition
    #[error("{firmware} size is over partitions size. ({size} > {limit})")]
    Oversize {
        /// Firmware file name
        firmware: String,
        /// Bytes the firmware occupies in flash
        size: usize,
        /// Declared partition size
        limit: usize,
    },

    /// CRC-encoded data failed verification
    #[error("CRC mismatch in block at physical offset 0x{offset:08x}")]
    CrcMismatch {
        /// Physical offset of the failing block
        offset: usize,
    },

    /// CRC-encoded data is not a whole number of blocks
    #[error("CRC encoded image length {0} is not a multiple of 34")]
    TruncatedBlock(usize),

    /// OTA table cannot be derived from the layout
    #[error("OTA partition table: {0}")]
    Ota(String),

    /// OTA record encoding or decoding failed
    #[error("OTA record: {0}")]
    Record(#[from] RecordError),

    /// Filesystem failure
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing { .. } => ErrorKind::ConfigMissing,
            Self::Table { .. } | Self::InvalidNumber(_) | Self::Json { .. } | Self::Toml { .. } => {
                ErrorKind::Parse
            }
            Self::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Validation,
        }
    }

    /// Build an I/O error bound to `path`
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias using the bkpack Error type
pub type Result<T> = core::result::Result<T, Error>;

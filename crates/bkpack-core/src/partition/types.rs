//! Partition types

use core::fmt;

use std::string::String;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Access permissions granted to a partition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Access: u8 {
        /// Code may run from this partition
        const EXECUTE = 1 << 0;
        /// Readable at runtime
        const READ = 1 << 1;
        /// Writable at runtime
        const WRITE = 1 << 2;
    }
}

/// What a partition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    /// Executable firmware
    Code,
    /// Plain data
    Data,
}

impl PartitionMode {
    /// Parse the mode column of a partition table
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Some(Self::Code),
            "data" => Some(Self::Data),
            _ => None,
        }
    }

    /// Table spelling of this mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named flash partition
///
/// Serialized with the key names the layout manifest uses
/// (`Id`, `Name`, `Offset`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Partition {
    /// Identifier used by the generated header
    pub id: u32,
    /// Partition name
    pub name: String,
    /// Start address
    pub offset: u32,
    /// Length in bytes
    pub size: u32,
    /// Whether code runs from this partition
    pub execute: bool,
    /// Runtime read permission
    pub read: bool,
    /// Runtime write permission
    pub write: bool,
}

impl Partition {
    /// Create a readable, non-executable partition
    pub fn new(id: u32, name: impl Into<String>, offset: u32, size: u32) -> Self {
        Self {
            id,
            name: name.into(),
            offset,
            size,
            execute: false,
            read: true,
            write: false,
        }
    }

    /// Set the permissions from an [`Access`] set
    pub fn with_access(mut self, access: Access) -> Self {
        self.execute = access.contains(Access::EXECUTE);
        self.read = access.contains(Access::READ);
        self.write = access.contains(Access::WRITE);
        self
    }

    /// Permissions as an [`Access`] set
    pub fn access(&self) -> Access {
        let mut access = Access::empty();
        access.set(Access::EXECUTE, self.execute);
        access.set(Access::READ, self.read);
        access.set(Access::WRITE, self.write);
        access
    }

    /// Mode implied by the execute flag
    pub fn mode(&self) -> PartitionMode {
        if self.execute {
            PartitionMode::Code
        } else {
            PartitionMode::Data
        }
    }

    /// One past the last byte, widened so it cannot overflow
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    /// Check if an address is within this partition
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.offset && u64::from(addr) < self.end()
    }

    /// Check if this partition shares any byte with another
    pub fn overlaps(&self, other: &Partition) -> bool {
        u64::from(self.offset) < other.end() && u64::from(other.offset) < self.end()
    }

    /// Check if both offset and size are multiples of `alignment`
    pub fn is_aligned(&self, alignment: u32) -> bool {
        self.offset.is_multiple_of(alignment) && self.size.is_multiple_of(alignment)
    }
}

/// Placement rule for a mandatory partition
///
/// `index` pins the partition to a table position; negative values count
/// from the end (`-1` is the last partition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionLimit {
    /// Partition that must exist
    pub name: String,
    /// Required position, if any
    #[serde(default)]
    pub index: Option<i64>,
}

impl PartitionLimit {
    /// Require `name` to exist anywhere in the table
    pub fn exists(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// Require `name` at table position `index`
    pub fn at(name: impl Into<String>, index: i64) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// Resolve the required position against a table of `len` entries
    pub fn resolve_index(&self, len: usize) -> Option<usize> {
        let index = self.index?;
        if index >= 0 {
            usize::try_from(index).ok()
        } else {
            len.checked_sub(usize::try_from(index.unsigned_abs()).ok()?)
        }
    }
}

//! Partition table builder

use std::borrow::ToOwned;
use std::collections::BTreeMap;
use std::format;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::address::CRC_PARTITION_ALIGN;
use crate::descriptor::macro_name;
use crate::manifest::LayoutManifest;
use crate::size::{parse_hex, parse_size};
use crate::{Error, Result};

use super::types::{Partition, PartitionLimit, PartitionMode};

/// Every partition starts and ends on a flash sector
pub const SECTOR_ALIGN: u32 = 0x1000;

const CAPACITY_KEY: &str = "FLASH_CAPACITY";

/// A validated set of partitions for one flash device
#[derive(Debug, Clone)]
pub struct PartitionTable {
    partitions: Vec<Partition>,
    flash_capacity: u32,
    crc_enable: bool,
}

impl PartitionTable {
    /// Load and validate a table from a file
    pub fn from_csv_file(
        path: impl AsRef<Path>,
        flash_capacity: u32,
        crc_enable: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigMissing {
                what: "auto partition config table",
                path: path.to_path_buf(),
            });
        }
        log::info!("read partition table from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_csv_str(&content, flash_capacity, crc_enable)
    }

    /// Parse and validate a table
    ///
    /// `flash_capacity` is the default; a `FLASH_CAPACITY=` line in the
    /// source overrides it.
    pub fn from_csv_str(content: &str, flash_capacity: u32, crc_enable: bool) -> Result<Self> {
        let mut table = Self {
            partitions: Vec::new(),
            flash_capacity,
            crc_enable,
        };
        let mut cursor = 0u32;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix(CAPACITY_KEY) {
                let value = rest.trim_start().strip_prefix('=').ok_or_else(|| Error::Table {
                    line: line_no,
                    message: format!("expected {}=<size>", CAPACITY_KEY),
                })?;
                table.flash_capacity = parse_size(value)?;
                log::debug!("flash capacity overridden to 0x{:x}", table.flash_capacity);
                continue;
            }

            if let Some(var) = find_template_variable(line) {
                return Err(Error::Table {
                    line: line_no,
                    message: format!("unexpanded variable ${}", var),
                });
            }

            let id = table.partitions.len() as u32;
            let part = parse_line(id, line_no, line, cursor)?;
            cursor = part.offset.saturating_add(part.size);
            log::debug!("{:?}", part);
            table.partitions.push(part);
        }

        table.validate()?;
        Ok(table)
    }

    /// Build a table from already constructed partitions
    pub fn from_partitions(
        partitions: Vec<Partition>,
        flash_capacity: u32,
        crc_enable: bool,
    ) -> Result<Self> {
        let table = Self {
            partitions,
            flash_capacity,
            crc_enable,
        };
        table.validate()?;
        Ok(table)
    }

    /// Check sizes, names, alignment, overlaps and flash bounds
    pub fn validate(&self) -> Result<()> {
        if !self.has_executable() {
            log::warn!("partition table has no executable partition");
        }
        self.check_sizes()?;
        self.check_names()?;
        self.check_alignment()?;
        self.check_overlaps()?;
        self.check_bounds()
    }

    /// Whether any partition holds code
    pub fn has_executable(&self) -> bool {
        self.partitions.iter().any(|p| p.execute)
    }

    fn check_sizes(&self) -> Result<()> {
        match self.partitions.iter().find(|p| p.size == 0) {
            Some(p) => Err(Error::EmptyPartition {
                name: p.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_names(&self) -> Result<()> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for part in &self.partitions {
            let key = macro_name(&part.name);
            if let Some(first) = seen.get(&key) {
                if *first == part.name {
                    return Err(Error::DuplicateName {
                        name: part.name.clone(),
                    });
                }
                return Err(Error::MacroCollision {
                    first: (*first).to_owned(),
                    second: part.name.clone(),
                    macro_name: key,
                });
            }
            seen.insert(key, &part.name);
        }
        Ok(())
    }

    fn check_alignment(&self) -> Result<()> {
        for part in &self.partitions {
            let aligned = part.is_aligned(SECTOR_ALIGN)
                && (!(self.crc_enable && part.execute) || part.is_aligned(CRC_PARTITION_ALIGN));
            if !aligned {
                return Err(Error::Alignment {
                    name: part.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_overlaps(&self) -> Result<()> {
        let mut order: Vec<&Partition> = self.partitions.iter().collect();
        order.sort_by_key(|p| p.offset);

        // Sweep: compare each start against the furthest end seen so far
        let mut reach: Option<&Partition> = None;
        for part in order {
            if let Some(prev) = reach {
                if u64::from(part.offset) < prev.end() {
                    return Err(Error::Overlap {
                        first: prev.name.clone(),
                        second: part.name.clone(),
                    });
                }
            }
            if reach.is_none_or(|prev| part.end() > prev.end()) {
                reach = Some(part);
            }
        }
        Ok(())
    }

    fn check_bounds(&self) -> Result<()> {
        let capacity = u64::from(self.flash_capacity);
        match self.partitions.iter().find(|p| p.end() > capacity) {
            Some(p) => Err(Error::OutOfFlash {
                name: p.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Enforce mandatory partitions and their positions
    pub fn apply_default_setting(&self, limits: &[PartitionLimit]) -> Result<()> {
        for limit in limits {
            let position = self
                .partitions
                .iter()
                .position(|p| p.name == limit.name)
                .ok_or_else(|| Error::MissingPartition {
                    name: limit.name.clone(),
                })?;
            if limit.index.is_none() {
                continue;
            }
            if limit.resolve_index(self.partitions.len()) != Some(position) {
                return Err(Error::IndexMismatch {
                    name: limit.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Re-sequence partition ids
    ///
    /// The i-th reserved name gets id `i` when it exists in the table; a
    /// reserved name that is absent still consumes its id. Every other
    /// partition is numbered from `reserved.len()` upward in table order.
    pub fn reassign_reserved_ids<S: AsRef<str>>(&mut self, reserved: &[S]) {
        let mut next_id = reserved.len() as u32;
        for part in &mut self.partitions {
            match reserved.iter().position(|r| r.as_ref() == part.name) {
                Some(slot) => part.id = slot as u32,
                None => {
                    part.id = next_id;
                    next_id += 1;
                }
            }
        }
    }

    /// Alias of [`Self::reassign_reserved_ids`]
    pub fn sort_partitions<S: AsRef<str>>(&mut self, reserved: &[S]) {
        self.reassign_reserved_ids(reserved)
    }

    /// Partitions in table order
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Find a partition by name
    pub fn find(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.name == name)
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether the table has no partitions
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Flash capacity after any in-table override
    pub fn flash_capacity(&self) -> u32 {
        self.flash_capacity
    }

    /// Whether executable partitions are CRC encoded
    pub fn crc_enable(&self) -> bool {
        self.crc_enable
    }

    /// Snapshot this table as the manifest handed to later stages
    pub fn to_manifest(&self) -> LayoutManifest {
        LayoutManifest {
            crc_enable: self.crc_enable,
            section: self.partitions.clone(),
        }
    }
}

fn parse_line(id: u32, line_no: usize, line: &str, cursor: u32) -> Result<Partition> {
    let table_err = |message: String| Error::Table {
        line: line_no,
        message,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(table_err(format!(
            "expected 6 fields (name, offset, size, mode, read, write), found {}",
            fields.len()
        )));
    }

    let name = fields[0];
    if name.is_empty() {
        return Err(table_err("empty partition name".to_string()));
    }

    let offset = if fields[1].is_empty() {
        cursor
    } else {
        parse_hex(fields[1])?
    };
    let size = parse_size(fields[2])?;
    let mode = PartitionMode::parse(fields[3])
        .ok_or_else(|| table_err(format!("not support type: {}", fields[3])))?;
    let read = parse_flag(fields[4]).ok_or_else(|| table_err(format!("bad read flag: {}", fields[4])))?;
    let write =
        parse_flag(fields[5]).ok_or_else(|| table_err(format!("bad write flag: {}", fields[5])))?;

    Ok(Partition {
        id,
        name: name.to_owned(),
        offset,
        size,
        execute: mode == PartitionMode::Code,
        read,
        write,
    })
}

fn parse_flag(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Find the first `$NAME` reference not escaped by a backslash
fn find_template_variable(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'$' || (i > 0 && bytes[i - 1] == b'\\') {
            continue;
        }
        let rest = &line[i + 1..];
        let starts_ident = rest
            .bytes()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_');
        if starts_ident {
            let len = rest
                .bytes()
                .position(|c| !(c.is_ascii_alphanumeric() || c == b'_'))
                .unwrap_or(rest.len());
            return Some(&rest[..len]);
        }
    }
    None
}

//! Text renderings of a partition table

use std::format;
use std::string::String;
use std::vec::Vec;

use crate::size::{format_addr, format_size};

use super::table::PartitionTable;
use super::types::Partition;

/// Header line of the re-serialized table, itself a comment
pub const CSV_HEADER: &str = "# Name,Offset,Size,Mode,Read,Write";

const UNUSED: &str = "(unused)";
const RULE_WIDTH: usize = 72;

impl PartitionTable {
    /// Re-serialize the table in a form the builder accepts again
    ///
    /// The capacity is written out so the result parses the same under
    /// any default capacity.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        out.push_str(&format!("FLASH_CAPACITY={}\n", format_size(self.flash_capacity())));
        for part in self.partitions() {
            out.push_str(&format!(
                "{},{},{},{},{},{}\n",
                part.name,
                format_addr(part.offset),
                format_size(part.size),
                part.mode(),
                part.read,
                part.write
            ));
        }
        out
    }

    /// Fixed-width table with `(unused)` rows for every gap up to capacity
    pub fn to_pretty_table(&self) -> String {
        let mut out = format!(
            "{:<24} {:>10} {:>8} {:>10} {:>4} {:>5} {:>5}\n",
            "Name", "Offset", "Size", "End", "Mode", "Read", "Write"
        );
        out.push_str(&"-".repeat(RULE_WIDTH));
        out.push('\n');

        let mut by_offset: Vec<&Partition> = self.partitions().iter().collect();
        by_offset.sort_by_key(|p| p.offset);

        let mut cursor = 0u64;
        for part in by_offset {
            if u64::from(part.offset) > cursor {
                out.push_str(&unused_row(cursor, u64::from(part.offset)));
            }
            out.push_str(&partition_row(part));
            cursor = cursor.max(part.end());
        }
        let capacity = u64::from(self.flash_capacity());
        if cursor < capacity {
            out.push_str(&unused_row(cursor, capacity));
        }
        out
    }
}

fn partition_row(part: &Partition) -> String {
    format!(
        "{:<24} 0x{:08x} {:>8} 0x{:08x} {:>4} {:>5} {:>5}\n",
        part.name,
        part.offset,
        format_size(part.size),
        part.end(),
        part.mode(),
        part.read,
        part.write
    )
}

fn unused_row(start: u64, end: u64) -> String {
    let size = u32::try_from(end - start).map_or_else(|_| format!("{}", end - start), format_size);
    format!(
        "{:<24} 0x{:08x} {:>8} 0x{:08x} {:>4} {:>5} {:>5}\n",
        UNUSED, start, size, end, "-", "-", "-"
    )
}

//! Flash partition tables
//!
//! A partition table is parsed from a line oriented, comma separated
//! source:
//!
//! ```text
//! # name, offset, size, mode, read, write
//! FLASH_CAPACITY=8M
//! primary_bootloader, 0x0, 68K, code, true, false
//! primary_app,         , 2176K, code, true, false
//! usr_config,          , 64K, data, true, true
//! ```
//!
//! An empty offset places the partition right after the previous one.
//! The table is validated as a whole (alignment, overlap, flash bounds)
//! before anything is handed downstream.
//!
//! ```ignore
//! let mut table = PartitionTable::from_csv_file("auto_partitions.csv", 8 << 20, true)?;
//! table.apply_default_setting(&limits)?;
//! table.sort_partitions(&["primary_bootloader", "primary_app"]);
//! print!("{}", table.to_pretty_table());
//! ```

mod render;
mod table;
mod types;

pub use table::*;
pub use types::*;

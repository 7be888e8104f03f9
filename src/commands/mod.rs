//! CLI command implementations
//!
//! Each submodule maps one subcommand onto the `bkpack_core` API. Commands
//! report what they wrote on stdout; details go through `log`.

pub mod build;
pub mod crc;
pub mod ota;
pub mod pack;
pub mod partition;

/// Format a byte count the way the partition table does
pub fn format_size(size: usize) -> String {
    if size >= 1024 * 1024 {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 {
        format!("{} KiB", size / 1024)
    } else {
        format!("{} B", size)
    }
}

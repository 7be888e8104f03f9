//! bkpack-core - Flash layout, image codec and OTA table generation
//!
//! This crate turns a declarative partition table into a validated flash
//! layout, emits the artifacts the firmware build consumes (JSON manifest,
//! C header, package descriptor), links per-partition binaries into a
//! single flash image and derives the OTA partition table that gets
//! attached to the bootloader.
//!
//! The pieces a bootloader needs at runtime (CRC primitives, the
//! logical/physical address translation and the OTA record wire format)
//! are `no_std` compatible. Everything that parses text, touches the
//! filesystem or produces JSON requires the `std` feature.
//!
//! # Features
//!
//! - `std` - Enable standard library support and every module that
//!   parses, writes files or allocates, default
//!
//! # Example
//!
//! ```ignore
//! use bkpack_core::partition::PartitionTable;
//!
//! let table = PartitionTable::from_csv_file("auto_partitions.csv", 8 << 20, true)?;
//! let manifest = table.to_manifest();
//! std::fs::write("partitions.json", manifest.to_json_string()?)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod address;
pub mod crc;
pub mod ota;

#[cfg(feature = "std")]
pub mod codec;
#[cfg(feature = "std")]
pub mod descriptor;
#[cfg(feature = "std")]
pub mod error;
#[cfg(feature = "std")]
pub mod manifest;
#[cfg(feature = "std")]
pub mod output;
#[cfg(feature = "std")]
pub mod partition;
#[cfg(feature = "std")]
pub mod pipeline;
#[cfg(feature = "std")]
pub mod project;
#[cfg(feature = "std")]
pub mod size;
#[cfg(feature = "std")]
pub mod summary;

#[cfg(feature = "std")]
pub use error::{Error, ErrorKind, Result};

//! OTA partition support
//!
//! The OTA updater and the bootloader only care about a handful of
//! partitions. This module derives that reduced view from the layout
//! manifest:
//!
//! - single image: `bootloader`, `app*` and `download` records
//! - dual bank (AB): `bootloader` plus one merged `appa` record spanning
//!   every application partition
//!
//! and serializes it into the fixed-size [`OtaRecord`] table that gets
//! attached to the bootloader image.

mod record;

#[cfg(feature = "std")]
mod attach;
#[cfg(feature = "std")]
mod transform;

pub use record::*;

#[cfg(feature = "std")]
pub use attach::{app_image, attach_to_bootloader, serialize_table, ATTACH_ALIGN, OTA_APP_ALIGN};
#[cfg(feature = "std")]
pub use transform::{AbConfiguration, OtaDescriptor, OtaMode, OtaPartition, OtaTransformer};

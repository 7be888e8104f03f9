//! Image codec
//!
//! Physical CRC encoding of firmware payloads and linking of payloads
//! into a single flash image.

mod linker;
mod packager;
mod physical;

pub use linker::{
    check_overlaps, link, Encoding, LinkMode, PackStrategy, Section, StartPadding, IMAGE_ALIGN,
};
pub use packager::{Packager, ALL_APP_BIN};
pub use physical::{crc_decode, crc_encode, encoded_len};

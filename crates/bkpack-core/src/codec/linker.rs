//! Image linking
//!
//! Links per-partition binaries into one flash image. Placement and
//! encoding are independent choices:
//!
//! | link   | plain                      | crc                           |
//! |--------|----------------------------|-------------------------------|
//! | linear | binaries at `start_addr`   | encoded binaries at `start`   |
//! | format | binaries back to back      | encoded binaries back to back |
//!
//! Both are pure functions of the sections and their payloads.

use std::borrow::Cow;
use std::borrow::ToOwned;
use std::vec;
use std::vec::Vec;

use crate::{Error, Result};

use super::physical::crc_encode;

/// Every linked image is padded to this boundary with `0xFF`
pub const IMAGE_ALIGN: usize = 32;

const ERASED: u8 = 0xFF;

/// How sections are placed in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// At their absolute start addresses, gaps filled with `0xFF`
    #[default]
    Linear,
    /// Back to back in descriptor order, addresses ignored
    Format,
}

/// How each payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// As-is
    #[default]
    Plain,
    /// As 34-byte CRC-protected blocks
    Crc,
}

/// Where a linear image begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPadding {
    /// At flash address 0
    #[default]
    FromZero,
    /// At the lowest section start
    FromFirstSection,
}

/// Complete packing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackStrategy {
    /// Placement
    pub link: LinkMode,
    /// Payload encoding
    pub encoding: Encoding,
    /// Start of a linear image
    pub start_padding: StartPadding,
}

impl PackStrategy {
    /// Linear strategy with the given encoding
    pub fn linear(encoding: Encoding) -> Self {
        Self {
            link: LinkMode::Linear,
            encoding,
            start_padding: StartPadding::FromZero,
        }
    }

    /// Format strategy with the given encoding
    pub fn format(encoding: Encoding) -> Self {
        Self {
            link: LinkMode::Format,
            encoding,
            start_padding: StartPadding::FromZero,
        }
    }

    /// Begin linear images at the first section
    pub fn trim_start(mut self) -> Self {
        self.start_padding = StartPadding::FromFirstSection;
        self
    }
}

/// A firmware payload bound to its target partition
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    /// Firmware name, used in error messages
    pub firmware: &'a str,
    /// Absolute start address
    pub start: u32,
    /// Declared partition size
    pub size: u32,
    /// Firmware bytes before encoding
    pub data: &'a [u8],
}

impl Section<'_> {
    fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.size)
    }
}

/// Reject sections whose declared ranges share any byte
pub fn check_overlaps(sections: &[Section<'_>]) -> Result<()> {
    let mut order: Vec<&Section<'_>> = sections.iter().collect();
    order.sort_by_key(|s| s.start);

    let mut reach = 0u64;
    for (i, section) in order.iter().enumerate() {
        if i > 0 && u64::from(section.start) < reach {
            return Err(Error::SectionOverlap);
        }
        reach = reach.max(section.end());
    }
    Ok(())
}

/// Link `sections` into a single image
pub fn link(sections: &[Section<'_>], strategy: PackStrategy) -> Result<Vec<u8>> {
    check_overlaps(sections)?;

    let payloads = sections
        .iter()
        .map(|section| {
            let payload = match strategy.encoding {
                Encoding::Plain => Cow::Borrowed(section.data),
                Encoding::Crc => Cow::Owned(crc_encode(section.data)),
            };
            if payload.len() > section.size as usize {
                return Err(Error::Oversize {
                    firmware: section.firmware.to_owned(),
                    size: payload.len(),
                    limit: section.size as usize,
                });
            }
            Ok(payload)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut image = match strategy.link {
        LinkMode::Linear => link_linear(sections, &payloads, strategy.start_padding),
        LinkMode::Format => payloads.iter().flat_map(|p| p.iter().copied()).collect(),
    };

    let padded = image.len().next_multiple_of(IMAGE_ALIGN);
    image.resize(padded, ERASED);
    Ok(image)
}

fn link_linear(sections: &[Section<'_>], payloads: &[Cow<'_, [u8]>], start: StartPadding) -> Vec<u8> {
    let base: usize = match start {
        StartPadding::FromZero => 0,
        StartPadding::FromFirstSection => {
            sections.iter().map(|s| s.start).min().unwrap_or(0) as usize
        }
    };
    let end = sections.iter().map(|s| s.end()).max().unwrap_or(0) as usize;

    let mut image = vec![ERASED; end.saturating_sub(base)];
    for (section, payload) in sections.iter().zip(payloads) {
        let at = section.start as usize - base;
        image[at..at + payload.len()].copy_from_slice(payload);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    fn sections<'a>(boot: &'a [u8], app: &'a [u8]) -> [Section<'a>; 2] {
        [
            Section {
                firmware: "bootloader.bin",
                start: 0x40,
                size: 0x80,
                data: boot,
            },
            Section {
                firmware: "app.bin",
                start: 0x100,
                size: 0x80,
                data: app,
            },
        ]
    }

    #[test]
    fn test_linear_plain() {
        let boot = [0x11u8; 20];
        let app = [0x22u8; 50];
        let image = link(&sections(&boot, &app), PackStrategy::linear(Encoding::Plain)).unwrap();

        // Runs to the end of the last declared partition
        assert_eq!(image.len(), 0x180);
        assert!(image[..0x40].iter().all(|&b| b == 0xFF));
        assert_eq!(&image[0x40..0x54], &boot);
        assert!(image[0x54..0x100].iter().all(|&b| b == 0xFF));
        assert_eq!(&image[0x100..0x132], &app);
        assert!(image[0x132..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_linear_trim_start() {
        let boot = [0x11u8; 20];
        let app = [0x22u8; 50];
        let strategy = PackStrategy::linear(Encoding::Plain).trim_start();
        let image = link(&sections(&boot, &app), strategy).unwrap();
        assert_eq!(image.len(), 0x140);
        assert_eq!(&image[..20], &boot);
        assert_eq!(&image[0xC0..0xF2], &app);
    }

    #[test]
    fn test_linear_crc() {
        let boot = [0u8; 40];
        let app = [0x22u8; 32];
        let image = link(&sections(&boot, &app), PackStrategy::linear(Encoding::Crc)).unwrap();
        assert_eq!(&image[0x40..0x40 + 68], crc_encode(&boot).as_slice());
        assert_eq!(&image[0x40 + 32..0x40 + 34], &[0x80, 0x29]);
        assert_eq!(&image[0x100..0x100 + 34], crc_encode(&app).as_slice());
    }

    #[test]
    fn test_format() {
        let boot = [0x11u8; 20];
        let app = [0x22u8; 50];
        let image = link(&sections(&boot, &app), PackStrategy::format(Encoding::Plain)).unwrap();
        assert_eq!(image.len(), 96);
        assert_eq!(&image[..20], &boot);
        assert_eq!(&image[20..70], &app);
        assert!(image[70..].iter().all(|&b| b == 0xFF));

        let image = link(&sections(&boot, &app), PackStrategy::format(Encoding::Crc)).unwrap();
        assert_eq!(image.len(), 128);
        assert_eq!(&image[34..102], crc_encode(&app).as_slice());
    }

    #[test]
    fn test_oversize() {
        let boot = [0u8; 0x81];
        let err = link(&sections(&boot, &[]), PackStrategy::linear(Encoding::Plain)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bootloader.bin size is over partitions size. (129 > 128)"
        );

        // Encoding grows 128 bytes to 136, past the 0x80 partition
        let boot = [0u8; 0x80];
        assert!(matches!(
            link(&sections(&boot, &[]), PackStrategy::linear(Encoding::Crc)),
            Err(Error::Oversize { size: 136, .. })
        ));
    }

    #[test]
    fn test_overlap() {
        let mut s = sections(&[], &[]);
        s[1].start = 0xA0;
        assert!(matches!(
            link(&s, PackStrategy::format(Encoding::Plain)),
            Err(Error::SectionOverlap)
        ));
        s[1].start = 0xC0;
        assert!(check_overlaps(&s).is_ok());
    }

    #[test]
    fn test_empty() {
        let image = link(&[], PackStrategy::default()).unwrap();
        assert!(image.is_empty());
    }
}

//! Bootloader attach table and OTA application image

use std::path::Path;
use std::vec::Vec;

use zerocopy::IntoBytes;

use crate::address::physical_size_to_logical;
use crate::codec::{Encoding, LinkMode, Packager, StartPadding};
use crate::descriptor::{PackageDescriptor, BOOTLOADER};
use crate::size::{format_addr, format_size};
use crate::Result;

use super::transform::OtaDescriptor;

/// Boundary the table blob is attached at
pub const ATTACH_ALIGN: usize = 32;

/// Boundary the OTA application image is padded to
pub const OTA_APP_ALIGN: usize = 64;

/// Encode every entry of `descriptor` as a 64-byte record, in order
pub fn serialize_table(descriptor: &OtaDescriptor) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    for part in &descriptor.part_table {
        let record = part.to_record()?;
        log::debug!("{:?}", record);
        blob.extend_from_slice(record.as_bytes());
    }
    Ok(blob)
}

/// Append the table blob to a bootloader image
///
/// The bootloader is padded with zeros to a 32-byte boundary first.
pub fn attach_to_bootloader(bootloader: &[u8], table: &[u8]) -> Vec<u8> {
    let padded = bootloader.len().next_multiple_of(ATTACH_ALIGN);
    let mut image = Vec::with_capacity(padded + table.len());
    image.extend_from_slice(bootloader);
    image.resize(padded, 0x00);
    image.extend_from_slice(table);
    image
}

/// Link the application sections into the image an OTA update carries
///
/// The bootloader section is dropped, CRC layouts are translated to
/// logical addresses, and the result starts at the first application.
pub fn app_image(descriptor: &PackageDescriptor, workdir: &Path) -> Result<Vec<u8>> {
    let mut logical = descriptor.clone();
    logical.section.retain(|s| !s.partition.contains(BOOTLOADER));

    if descriptor.crc_enable {
        for section in &mut logical.section {
            let start = physical_size_to_logical(section.start()?);
            let size = physical_size_to_logical(section.size_bytes()?) / 1024 * 1024;
            section.start_addr = format_addr(start);
            section.size = format_size(size);
        }
    }
    logical.crc_enable = false;
    logical.count = logical.section.len();

    let mut image = Packager::new(workdir, &logical)?
        .link_mode(LinkMode::Linear)
        .encoding(Encoding::Plain)
        .start_padding(StartPadding::FromFirstSection)
        .pack()?;

    let padded = image.len().next_multiple_of(OTA_APP_ALIGN);
    image.resize(padded, 0xFF);
    log::info!(
        "OTA application image: {} sections, {} bytes",
        logical.count,
        image.len()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PackageSection;
    use crate::ota::{OtaMode, OtaRecord, OtaTransformer, OTA_RECORD_SIZE};
    use crate::partition::PartitionTable;
    use std::fs;
    use std::vec;

    #[test]
    fn test_attach_padding() {
        let table = [0xABu8; 64];

        let image = attach_to_bootloader(&[1u8; 20], &table);
        assert_eq!(image.len(), 32 + 64);
        assert!(image[20..32].iter().all(|&b| b == 0));
        assert_eq!(&image[32..], &table);

        // Already aligned: no padding
        let image = attach_to_bootloader(&[1u8; 64], &table);
        assert_eq!(image.len(), 128);
        assert_eq!(&image[64..], &table);
    }

    #[test]
    fn test_serialize_table() {
        let csv = "\
primary_bootloader, 0x0, 68K, code, true, false
primary_app, , 2176K, code, true, false
ota, , 1024K, data, true, true
";
        let manifest = PartitionTable::from_csv_str(csv, 8 << 20, true)
            .unwrap()
            .to_manifest();
        let desc = OtaTransformer::new(&manifest)
            .descriptor(OtaMode::Single)
            .unwrap();
        let blob = serialize_table(&desc).unwrap();
        assert_eq!(blob.len(), 3 * OTA_RECORD_SIZE);

        let records: Vec<OtaRecord> = OtaRecord::parse_blob(&blob)
            .unwrap()
            .collect::<core::result::Result<_, _>>()
            .unwrap();
        assert_eq!(records[0].crc(), 0x569B_B6DF);
        assert_eq!(records[1].crc(), 0x7730_6B37);
        assert_eq!(records[2].name(), "download");
        assert_eq!(records[2].flash_name(), "beken_onchip");
    }

    #[test]
    fn test_app_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.bin"), [0x11u8; 100]).unwrap();
        fs::write(dir.path().join("app1.bin"), [0x22u8; 10]).unwrap();

        let section = vec![
            PackageSection {
                firmware: "bootloader.bin".into(),
                partition: "bootloader".into(),
                start_addr: "0x00000000".into(),
                size: "68K".into(),
            },
            PackageSection {
                firmware: "app.bin".into(),
                partition: "application".into(),
                start_addr: "0x00011000".into(),
                size: "34K".into(),
            },
            PackageSection {
                firmware: "app1.bin".into(),
                partition: "application1".into(),
                start_addr: "0x00019800".into(),
                size: "34K".into(),
            },
        ];
        let desc = PackageDescriptor {
            magic: "beken".into(),
            crc_enable: true,
            count: 3,
            section,
        };

        // bootloader.bin is absent from the work directory and never read
        let image = app_image(&desc, dir.path()).unwrap();

        // 0x11000 -> 0x10000 and 0x19800 -> 0x18000 logical
        assert_eq!(image.len(), 0x8000 + 0x8000);
        assert_eq!(&image[..100], &[0x11; 100]);
        assert!(image[100..0x8000].iter().all(|&b| b == 0xFF));
        assert_eq!(&image[0x8000..0x800A], &[0x22; 10]);
        assert_eq!(image.len() % OTA_APP_ALIGN, 0);
    }
}

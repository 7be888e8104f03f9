//! OTA partition table derivation

use std::borrow::ToOwned;
use std::format;
use std::path::Path;
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::address::physical_size_to_logical;
use crate::descriptor::{classify, PackageSection, APPLICATION, BOOTLOADER, PACKAGE_MAGIC};
use crate::manifest::LayoutManifest;
use crate::output::{read_json, to_pretty_json};
use crate::partition::Partition;
use crate::size::{format_addr, format_size, parse_number, parse_size};
use crate::{Error, Result};

use super::record::{OtaRecord, OTA_RECORD_MAGIC};

const FLASH_CRC: &str = "beken_onchip_crc";
const FLASH_PLAIN: &str = "beken_onchip";
const MERGED_APP: &str = "appa";

/// Layout the updater works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtaMode {
    /// One application slot plus a download area
    #[default]
    Single,
    /// All applications merged into one swappable region
    DualBank,
}

/// One entry of the OTA descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtaPartition {
    /// Record magic as a hex string
    pub magic: String,
    /// Partition name seen by the bootloader
    pub name: String,
    /// Flash device name
    pub flash_name: String,
    /// Hex start address
    pub offset: String,
    /// Human readable length
    pub len: String,
}

impl OtaPartition {
    fn new(name: &str, flash_name: &str, offset: u32, len: u32) -> Self {
        Self {
            magic: format!("0x{:08x}", OTA_RECORD_MAGIC),
            name: name.to_owned(),
            flash_name: flash_name.to_owned(),
            offset: format_addr(offset),
            len: format_size(len),
        }
    }

    /// Encode as a binary record
    pub fn to_record(&self) -> Result<OtaRecord> {
        let magic = parse_number(&self.magic)?;
        if magic != OTA_RECORD_MAGIC {
            return Err(Error::Ota(format!(
                "{}: unexpected magic {}",
                self.name, self.magic
            )));
        }
        let record = OtaRecord::new(
            &self.name,
            &self.flash_name,
            parse_number(&self.offset)?,
            parse_size(&self.len)?,
        )?;
        Ok(record)
    }
}

/// OTA descriptor document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtaDescriptor {
    /// Entries sorted by offset
    pub part_table: Vec<OtaPartition>,
}

impl OtaDescriptor {
    /// Load an OTA descriptor
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json("ota json", path.as_ref())
    }

    /// Pretty JSON rendering
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(self)
    }
}

/// Descriptor handed to the AB image tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbConfiguration {
    /// Always `"beken"`
    pub magic: String,
    /// Number of sections
    pub count: usize,
    /// Bootloader and merged application, in logical addresses
    pub section: Vec<PackageSection>,
}

impl AbConfiguration {
    /// Pretty JSON rendering
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(self)
    }
}

/// Derives OTA views from a layout manifest
#[derive(Debug, Clone)]
pub struct OtaTransformer {
    crc_enable: bool,
    partitions: Vec<Partition>,
}

impl OtaTransformer {
    /// Classify the partitions of `manifest`
    pub fn new(manifest: &LayoutManifest) -> Self {
        Self {
            crc_enable: manifest.crc_enable,
            partitions: classify(&manifest.section),
        }
    }

    /// Load a manifest file and classify it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("read partitions from {}", path.display());
        Ok(Self::new(&LayoutManifest::from_file(path)?))
    }

    /// Build the OTA descriptor for `mode`
    pub fn descriptor(&self, mode: OtaMode) -> Result<OtaDescriptor> {
        self.bootloader()?;
        let mut part_table = match mode {
            OtaMode::Single => self.single_image(),
            OtaMode::DualBank => self.dual_bank()?,
        };
        part_table.sort_by_key(|(offset, _)| *offset);
        Ok(OtaDescriptor {
            part_table: part_table.into_iter().map(|(_, p)| p).collect(),
        })
    }

    fn bootloader(&self) -> Result<&Partition> {
        self.partitions
            .iter()
            .find(|p| p.name == BOOTLOADER)
            .ok_or_else(|| Error::Ota("bootloader partition is missing".to_string()))
    }

    fn single_image(&self) -> Vec<(u32, OtaPartition)> {
        self.partitions
            .iter()
            .filter_map(|p| {
                let name = if is_numbered(&p.name, BOOTLOADER) {
                    p.name.clone()
                } else if is_numbered(&p.name, APPLICATION) {
                    p.name.replacen(APPLICATION, "app", 1)
                } else if p.name == "ota" {
                    "download".to_owned()
                } else if is_numbered(&p.name, "ota") {
                    p.name.clone()
                } else {
                    return None;
                };
                let flash = if p.execute { FLASH_CRC } else { FLASH_PLAIN };
                Some((p.offset, OtaPartition::new(&name, flash, p.offset, p.size)))
            })
            .collect()
    }

    fn dual_bank(&self) -> Result<Vec<(u32, OtaPartition)>> {
        let (app_offset, app_size) = self.merged_application()?;
        let mut table = vec![(
            app_offset,
            OtaPartition::new(MERGED_APP, FLASH_CRC, app_offset, app_size),
        )];

        for p in &self.partitions {
            let keep = is_numbered(&p.name, BOOTLOADER)
                || is_numbered(&p.name, "s_app")
                || is_numbered(&p.name, "ota_fina_executive");
            if !keep {
                continue;
            }
            let flash = if p.execute || is_numbered(&p.name, "s_app") {
                FLASH_CRC
            } else {
                FLASH_PLAIN
            };
            table.push((p.offset, OtaPartition::new(&p.name, flash, p.offset, p.size)));
        }
        Ok(table)
    }

    /// Region spanning every application: lowest offset, summed size
    fn merged_application(&self) -> Result<(u32, u32)> {
        let apps = self
            .partitions
            .iter()
            .filter(|p| is_numbered(&p.name, APPLICATION));
        let offset = apps.clone().map(|p| p.offset).min();
        let total = apps.map(|p| u64::from(p.size)).sum::<u64>();
        let size = u32::try_from(total).map_err(|_| {
            Error::Ota(format!(
                "merged application region size 0x{:x} overflows 32 bits",
                total
            ))
        })?;

        match offset {
            Some(offset) if size > 0 => Ok((offset, size)),
            _ => Err(Error::Ota(
                "merged application region is empty".to_string(),
            )),
        }
    }

    /// Bootloader and merged application in the logical view
    pub fn ab_configuration(&self) -> Result<AbConfiguration> {
        let bootloader = self.bootloader()?;
        let (app_offset, app_size) = self.merged_application()?;

        let section = vec![
            self.ab_section("bootloader.bin", BOOTLOADER, bootloader.offset, bootloader.size),
            self.ab_section("app_ab.bin", "app", app_offset, app_size),
        ];
        Ok(AbConfiguration {
            magic: PACKAGE_MAGIC.to_owned(),
            count: section.len(),
            section,
        })
    }

    fn ab_section(&self, firmware: &str, partition: &str, start: u32, size: u32) -> PackageSection {
        let (start, size) = if self.crc_enable {
            (physical_size_to_logical(start), physical_size_to_logical(size))
        } else {
            (start, size)
        };
        PackageSection {
            firmware: firmware.to_owned(),
            partition: partition.to_owned(),
            start_addr: format_addr(start),
            size: format!("{}K", size / 1024),
        }
    }
}

/// `name` is `prefix` optionally followed by digits
fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Access, PartitionTable};

    const KIB: u32 = 1024;

    fn transformer(csv: &str, crc: bool) -> OtaTransformer {
        let table = PartitionTable::from_csv_str(csv, 8 * 1024 * KIB, crc).unwrap();
        OtaTransformer::new(&table.to_manifest())
    }

    const SINGLE: &str = "\
primary_bootloader, 0x0, 68K, code, true, false
primary_app, , 2176K, code, true, false
ota, , 1024K, data, true, true
usr_config, , 64K, data, true, true
";

    const DUAL: &str = "\
primary_bootloader, 0x0, 68K, code, true, false
primary_cp_app, , 272K, code, true, false
primary_ap_app, , 1020K, code, true, false
s_app, , 68K, data, true, false
ota_fina_executive, , 4K, data, true, true
usr_config, , 64K, data, true, true
";

    #[test]
    fn test_single_image() {
        let desc = transformer(SINGLE, true).descriptor(OtaMode::Single).unwrap();
        let names: Vec<&str> = desc.part_table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["bootloader", "app", "download"]);

        assert_eq!(
            desc.part_table[1],
            OtaPartition {
                magic: "0x45503130".into(),
                name: "app".into(),
                flash_name: "beken_onchip_crc".into(),
                offset: "0x00011000".into(),
                len: "2176K".into(),
            }
        );
        assert_eq!(desc.part_table[2].flash_name, "beken_onchip");
        assert_eq!(desc.part_table[2].offset, "0x00231000");
    }

    #[test]
    fn test_dual_bank() {
        let desc = transformer(DUAL, true).descriptor(OtaMode::DualBank).unwrap();
        let names: Vec<&str> = desc.part_table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["bootloader", "appa", "s_app", "ota_fina_executive"]);

        let appa = &desc.part_table[1];
        assert_eq!(appa.offset, "0x00011000");
        assert_eq!(appa.len, "1292K");
        assert_eq!(appa.flash_name, "beken_onchip_crc");
        assert_eq!(desc.part_table[2].flash_name, "beken_onchip_crc");
        assert_eq!(desc.part_table[3].flash_name, "beken_onchip");
    }

    #[test]
    fn test_dual_bank_merges_adjacent_apps() {
        let csv = "\
bootloader, 0x0, 64K, code, true, false
app_a, 0x10000, 4K, code, true, false
app_b, 0x11000, 4K, code, true, false
";
        let desc = transformer(csv, false).descriptor(OtaMode::DualBank).unwrap();
        let appa = desc.part_table.iter().find(|p| p.name == "appa").unwrap();
        assert_eq!(appa.offset, "0x00010000");
        assert_eq!(appa.len, "8K");
        assert_eq!(desc.part_table.len(), 2);
    }

    #[test]
    fn test_merged_region_overflow() {
        let code = Access::EXECUTE | Access::READ;
        let manifest = LayoutManifest {
            crc_enable: false,
            section: vec![
                Partition::new(0, "bootloader", 0, 0x1000).with_access(code),
                Partition::new(1, "app", 0x1000, 0x8000_0000).with_access(code),
                Partition::new(2, "app1", 0x8000_1000, 0x8000_0000).with_access(code),
            ],
        };
        let err = OtaTransformer::new(&manifest)
            .descriptor(OtaMode::DualBank)
            .unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }

    #[test]
    fn test_missing_bootloader() {
        let csv = "app, 0x0, 4K, code, true, false\n";
        let err = transformer(csv, false).descriptor(OtaMode::Single).unwrap_err();
        assert!(matches!(err, Error::Ota(_)));
    }

    #[test]
    fn test_empty_merged_region() {
        let csv = "bootloader, 0x0, 4K, code, true, false\ncfg, , 4K, data, true, true\n";
        let t = transformer(csv, false);
        assert!(t.descriptor(OtaMode::Single).is_ok());
        assert!(matches!(t.descriptor(OtaMode::DualBank), Err(Error::Ota(_))));
        assert!(t.ab_configuration().is_err());
    }

    #[test]
    fn test_records() {
        let desc = transformer(SINGLE, true).descriptor(OtaMode::Single).unwrap();
        let record = desc.part_table[0].to_record().unwrap();
        assert_eq!(record.name(), "bootloader");
        assert_eq!(record.size(), 0x11000);
        assert_eq!(record.crc(), 0x569B_B6DF);

        let mut bad = desc.part_table[0].clone();
        bad.magic = "0x12345678".into();
        assert!(matches!(bad.to_record(), Err(Error::Ota(_))));
    }

    #[test]
    fn test_ab_configuration() {
        let config = transformer(DUAL, true).ab_configuration().unwrap();
        assert_eq!(config.magic, "beken");
        assert_eq!(config.count, 2);

        // 68K physical is 64K logical; 0x11000 * 32 / 34 = 0x10000
        assert_eq!(config.section[0].firmware, "bootloader.bin");
        assert_eq!(config.section[0].start_addr, "0x00000000");
        assert_eq!(config.section[0].size, "64K");
        assert_eq!(config.section[1].firmware, "app_ab.bin");
        assert_eq!(config.section[1].partition, "app");
        assert_eq!(config.section[1].start_addr, "0x00010000");
        assert_eq!(config.section[1].size, "1216K");

        let plain = transformer(SINGLE, false).ab_configuration().unwrap();
        assert_eq!(plain.section[1].start_addr, "0x00011000");
        assert_eq!(plain.section[1].size, "2176K");
    }

    #[test]
    fn test_json() {
        let desc = transformer(SINGLE, false).descriptor(OtaMode::Single).unwrap();
        let json = desc.to_json_string().unwrap();
        assert!(json.starts_with("{\n    \"part_table\": [\n        {\n            \"magic\": \"0x45503130\","));
        let back: OtaDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_is_numbered() {
        assert!(is_numbered("ota", "ota"));
        assert!(is_numbered("ota2", "ota"));
        assert!(!is_numbered("ota_fina_executive", "ota"));
        assert!(!is_numbered("s_app_x", "s_app"));
    }
}

//! Layout descriptor
//!
//! Derives partition roles from a [`LayoutManifest`] and renders the
//! artifacts firmware builds consume: the C header with partition macros
//! and the package descriptor the image packager works from.

use std::borrow::ToOwned;
use std::format;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::manifest::LayoutManifest;
use crate::output::{read_json, to_pretty_json};
use crate::partition::{Access, Partition};
use crate::size::{format_addr, format_size, parse_number, parse_size};
use crate::Result;

/// Role name of the boot partition
pub const BOOTLOADER: &str = "bootloader";
/// Role name prefix of application partitions
pub const APPLICATION: &str = "application";
/// Magic string of package and AB configuration descriptors
pub const PACKAGE_MAGIC: &str = "beken";

const STORAGE_KIND: &str = "BK_FLASH_EMBEDDED";

/// Rename executable partitions to their roles
///
/// The first executable partition whose name contains `bootloader`
/// becomes `bootloader`; the remaining executables are numbered
/// `application`, `application1`, ... in table order. Data partitions
/// keep their names.
pub fn classify(partitions: &[Partition]) -> Vec<Partition> {
    let mut have_bootloader = false;
    let mut apps = 0usize;
    partitions
        .iter()
        .map(|part| {
            let mut part = part.clone();
            if !part.execute {
                return part;
            }
            if !have_bootloader && part.name.contains(BOOTLOADER) {
                have_bootloader = true;
                part.name = BOOTLOADER.to_owned();
            } else {
                part.name = match apps {
                    0 => APPLICATION.to_owned(),
                    n => format!("{}{}", APPLICATION, n),
                };
                apps += 1;
            }
            part
        })
        .collect()
}

/// Firmware file a classified partition is packed from
pub fn firmware_name(role: &str) -> String {
    match role.strip_prefix(APPLICATION) {
        Some(suffix) => format!("app{}.bin", suffix),
        None => format!("{}.bin", role),
    }
}

/// Classified view of a layout
#[derive(Debug, Clone)]
pub struct LayoutDescriptor {
    crc_enable: bool,
    classified: Vec<Partition>,
}

impl LayoutDescriptor {
    /// Classify the partitions of `manifest`
    pub fn new(manifest: &LayoutManifest) -> Self {
        Self {
            crc_enable: manifest.crc_enable,
            classified: classify(&manifest.section),
        }
    }

    /// Partitions renamed to their roles
    pub fn classified(&self) -> &[Partition] {
        &self.classified
    }

    /// Render the partition header
    ///
    /// Executable partitions appear under their roles (`BOOTLOADER`,
    /// `APPLICATION`, ...), data partitions under their own names.
    pub fn render_header(&self) -> String {
        let mut out = String::new();
        out.push_str("// Generated by bkpack from the partition table. Do not edit.\n\n");
        out.push_str("#pragma once\n\n");
        out.push_str(&define("CONFIG_FLASH_CRC_ENABLE", if self.crc_enable { "1" } else { "0" }));
        out.push_str(&define("CONFIG_PARTITION_COUNT", &format!("{}", self.classified.len())));
        out.push('\n');

        for part in &self.classified {
            let name = macro_name(&part.name);
            out.push_str(&define(
                &format!("CONFIG_{}_PARTITION_OFFSET", name),
                &format!("0x{:08X}", part.offset),
            ));
            out.push_str(&define(
                &format!("CONFIG_{}_PARTITION_SIZE", name),
                &format!("0x{:08X}", part.size),
            ));
        }
        out.push('\n');

        let mut by_id: Vec<&Partition> = self.classified.iter().collect();
        by_id.sort_by_key(|p| p.id);

        for part in &by_id {
            out.push_str(&define(
                &format!("BK_PARTITION_{}", macro_name(&part.name)),
                &format!("{}", part.id),
            ));
        }
        let table_size = by_id.last().map_or(0, |p| p.id + 1);
        out.push_str(&define("BK_PARTITIONS_TABLE_SIZE", &format!("{}", table_size)));
        out.push('\n');

        out.push_str("#define BK_FLASH_PARTITIONS_MAP \\\n{ \\\n");
        for part in &by_id {
            let name = macro_name(&part.name);
            out.push_str(&format!(
                "    [BK_PARTITION_{name}] = {{ \\\n\
                 \x20       .partition_owner       = {owner}, \\\n\
                 \x20       .partition_description = \"{desc}\", \\\n\
                 \x20       .partition_start_addr  = CONFIG_{name}_PARTITION_OFFSET, \\\n\
                 \x20       .partition_length      = CONFIG_{name}_PARTITION_SIZE, \\\n\
                 \x20       .partition_options     = {options}, \\\n\
                 \x20   }}, \\\n",
                name = name,
                owner = STORAGE_KIND,
                desc = part.name,
                options = access_tokens(part.access()),
            ));
        }
        out.push_str("}\n");
        out
    }

    /// Package descriptor for the executable partitions, by offset
    pub fn package_descriptor(&self) -> PackageDescriptor {
        let mut apps: Vec<&Partition> = self.classified.iter().filter(|p| p.execute).collect();
        apps.sort_by_key(|p| p.offset);

        let section: Vec<PackageSection> = apps
            .into_iter()
            .map(|p| PackageSection {
                firmware: firmware_name(&p.name),
                partition: p.name.clone(),
                start_addr: format_addr(p.offset),
                size: format_size(p.size),
            })
            .collect();

        PackageDescriptor {
            magic: PACKAGE_MAGIC.to_owned(),
            crc_enable: self.crc_enable,
            count: section.len(),
            section,
        }
    }
}

fn define(name: &str, value: &str) -> String {
    format!("#define {:<48} {}\n", name, value)
}

/// Upper-case a partition name into a C identifier fragment
pub(crate) fn macro_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn access_tokens(access: Access) -> String {
    let token = |flag: Access, en: &str, dis: &str| -> String {
        if access.contains(flag) {
            en.to_owned()
        } else {
            dis.to_owned()
        }
    };
    format!(
        "{} | {} | {}",
        token(Access::EXECUTE, "PAR_OPT_EXECUTE_EN", "PAR_OPT_EXECUTE_DIS"),
        token(Access::READ, "PAR_OPT_READ_EN", "PAR_OPT_READ_DIS"),
        token(Access::WRITE, "PAR_OPT_WRITE_EN", "PAR_OPT_WRITE_DIS"),
    )
}

/// One firmware placement of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    /// Firmware file, relative to the work directory
    pub firmware: String,
    /// Role of the target partition
    pub partition: String,
    /// Hex start address
    pub start_addr: String,
    /// Human readable partition size
    pub size: String,
}

impl PackageSection {
    /// Parsed start address
    pub fn start(&self) -> Result<u32> {
        parse_number(&self.start_addr)
    }

    /// Parsed partition size in bytes
    pub fn size_bytes(&self) -> Result<u32> {
        parse_size(&self.size)
    }
}

/// Descriptor the image packager consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDescriptor {
    /// Always [`PACKAGE_MAGIC`]
    pub magic: String,
    /// Whether sections are CRC encoded when packed
    pub crc_enable: bool,
    /// Number of sections
    pub count: usize,
    /// Sections sorted by start address
    pub section: Vec<PackageSection>,
}

impl PackageDescriptor {
    /// Load a package descriptor
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json("config json", path.as_ref())
    }

    /// Pretty JSON rendering
    pub fn to_json_string(&self) -> Result<String> {
        to_pretty_json(self)
    }
}

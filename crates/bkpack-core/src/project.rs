//! Project configuration
//!
//! A project is described by a TOML file:
//!
//! ```toml
//! [project]
//! name = "app"
//! soc = "bk7258"
//! flash_capacity = "8M"
//! crc_enable = true
//! ab_enable = false
//! partitions = "partitions/bk7258/auto_partitions.csv"
//! build_dir = "build"
//! firmware_dir = "build/firmware"
//! reserved = ["primary_bootloader", "primary_cp_app"]
//!
//! [[limit]]
//! name = "primary_bootloader"
//! index = 0
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! Pipeline stages only see the [`Platform`] trait, so other sources of
//! the same facts can stand in for the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::string::String;
use std::vec::Vec;

use serde::Deserialize;

use crate::codec::ALL_APP_BIN;
use crate::partition::PartitionLimit;
use crate::size::parse_size;
use crate::{Error, Result};

/// Default flash capacity when a project does not name one
pub const DEFAULT_FLASH_CAPACITY: u32 = 8 * 1024 * 1024;

/// Facts about the target a build needs
pub trait Platform {
    /// Project name
    fn name(&self) -> &str;

    /// Flash size in bytes, before any in-table override
    fn flash_capacity(&self) -> u32;

    /// Whether executable partitions are CRC encoded
    fn crc_enabled(&self) -> bool;

    /// Whether the updater uses the AB (dual bank) layout
    fn ab_enabled(&self) -> bool;

    /// Partition table source
    fn partitions_source(&self) -> &Path;

    /// Names that receive the leading partition ids, in order
    fn reserved_partitions(&self) -> &[String];

    /// Mandatory partitions and positions
    fn partition_limits(&self) -> &[PartitionLimit];

    /// Root of all generated files
    fn build_dir(&self) -> &Path;

    /// Directory holding `bootloader.bin`, `app.bin`, ...
    fn firmware_dir(&self) -> &Path;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectFile {
    project: ProjectSection,
    #[serde(default)]
    limit: Vec<PartitionLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectSection {
    name: String,
    #[serde(default)]
    soc: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    flash_capacity: Option<u32>,
    #[serde(default)]
    crc_enable: bool,
    #[serde(default)]
    ab_enable: bool,
    partitions: PathBuf,
    #[serde(default)]
    build_dir: Option<PathBuf>,
    #[serde(default)]
    firmware_dir: Option<PathBuf>,
    #[serde(default)]
    reserved: Vec<String>,
}

/// Deserialize a size that can be a number or a string like "8M"
fn deserialize_size<'de, D>(deserializer: D) -> core::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrStr {
        Int(u32),
        Str(String),
    }

    match SizeOrStr::deserialize(deserializer)? {
        SizeOrStr::Int(n) => Ok(Some(n)),
        SizeOrStr::Str(s) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Project loaded from a TOML file
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    name: String,
    soc: Option<String>,
    flash_capacity: u32,
    crc_enable: bool,
    ab_enable: bool,
    partitions: PathBuf,
    build_dir: PathBuf,
    firmware_dir: PathBuf,
    reserved: Vec<String>,
    limits: Vec<PartitionLimit>,
}

impl ProjectConfig {
    /// Load a project file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigMissing {
                what: "project config",
                path: path.to_path_buf(),
            });
        }
        log::info!("read project config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let base = path.parent().unwrap_or(Path::new(""));
        Self::parse(&content, base).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse project TOML, resolving relative paths against `base`
    pub fn from_toml_str(content: &str, base: impl AsRef<Path>) -> Result<Self> {
        Self::parse(content, base.as_ref()).map_err(|source| Error::Toml {
            path: PathBuf::from("<memory>"),
            source,
        })
    }

    fn parse(content: &str, base: &Path) -> core::result::Result<Self, toml::de::Error> {
        let file: ProjectFile = toml::from_str(content)?;
        let project = file.project;

        let build_dir = base.join(project.build_dir.unwrap_or_else(|| PathBuf::from("build")));
        let firmware_dir = match project.firmware_dir {
            Some(dir) => base.join(dir),
            None => build_dir.join("firmware"),
        };

        Ok(Self {
            name: project.name,
            soc: project.soc,
            flash_capacity: project.flash_capacity.unwrap_or(DEFAULT_FLASH_CAPACITY),
            crc_enable: project.crc_enable,
            ab_enable: project.ab_enable,
            partitions: base.join(project.partitions),
            build_dir,
            firmware_dir,
            reserved: project.reserved,
            limits: file.limit,
        })
    }

    /// Target SoC, if named
    pub fn soc(&self) -> Option<&str> {
        self.soc.as_deref()
    }

    /// Override the flash capacity
    pub fn set_flash_capacity(&mut self, capacity: u32) {
        self.flash_capacity = capacity;
    }

    /// Override CRC mode
    pub fn set_crc_enable(&mut self, enable: bool) {
        self.crc_enable = enable;
    }
}

impl Platform for ProjectConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn flash_capacity(&self) -> u32 {
        self.flash_capacity
    }

    fn crc_enabled(&self) -> bool {
        self.crc_enable
    }

    fn ab_enabled(&self) -> bool {
        self.ab_enable
    }

    fn partitions_source(&self) -> &Path {
        &self.partitions
    }

    fn reserved_partitions(&self) -> &[String] {
        &self.reserved
    }

    fn partition_limits(&self) -> &[PartitionLimit] {
        &self.limits
    }

    fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn firmware_dir(&self) -> &Path {
        &self.firmware_dir
    }
}

/// Per-run view of a [`Platform`] plus every output path it implies
pub struct BuildContext<'a> {
    platform: &'a dyn Platform,
    partitions_dir: PathBuf,
    package_dir: PathBuf,
}

impl<'a> BuildContext<'a> {
    /// Derive the output layout under the platform's build directory
    pub fn new(platform: &'a dyn Platform) -> Self {
        let build = platform.build_dir();
        Self {
            platform,
            partitions_dir: build.join("partitions"),
            package_dir: build.join("package"),
        }
    }

    /// The platform this run builds for
    pub fn platform(&self) -> &'a dyn Platform {
        self.platform
    }

    /// `<build>/partitions`
    pub fn partitions_dir(&self) -> &Path {
        &self.partitions_dir
    }

    /// `<build>/package`
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Re-serialized partition table
    pub fn partitions_csv(&self) -> PathBuf {
        self.partitions_dir.join("partitions.csv")
    }

    /// Layout manifest
    pub fn partitions_json(&self) -> PathBuf {
        self.partitions_dir.join("partitions.json")
    }

    /// Pretty table
    pub fn partitions_txt(&self) -> PathBuf {
        self.partitions_dir.join("partitions.txt")
    }

    /// C header
    pub fn header(&self) -> PathBuf {
        self.partitions_dir.join("partitions.h")
    }

    /// Package descriptor
    pub fn package_json(&self) -> PathBuf {
        self.partitions_dir.join("bk_package.json")
    }

    /// OTA descriptor
    pub fn ota_json(&self) -> PathBuf {
        self.partitions_dir.join("bk_ota_partitions.json")
    }

    /// AB configuration descriptor
    pub fn ab_config_json(&self) -> PathBuf {
        self.partitions_dir.join("configurationab.json")
    }

    /// Packed flash image
    pub fn all_app_bin(&self) -> PathBuf {
        self.package_dir.join(ALL_APP_BIN)
    }

    /// Bootloader with the OTA table attached
    pub fn bootloader_bin(&self) -> PathBuf {
        self.package_dir.join("bootloader.bin")
    }

    /// Build summary
    pub fn summary(&self) -> PathBuf {
        self.platform.build_dir().join("build_summary.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"
[project]
name = "app"
soc = "bk7258"
flash_capacity = "4M"
crc_enable = true
partitions = "partitions/auto_partitions.csv"
reserved = ["primary_bootloader", "primary_app"]

[[limit]]
name = "primary_bootloader"
index = 0

[[limit]]
name = "usr_config"
"#;

    #[test]
    fn test_parse() {
        let config = ProjectConfig::from_toml_str(PROJECT, "/proj").unwrap();
        assert_eq!(config.name(), "app");
        assert_eq!(config.soc(), Some("bk7258"));
        assert_eq!(config.flash_capacity(), 4 * 1024 * 1024);
        assert!(config.crc_enabled());
        assert!(!config.ab_enabled());
        assert_eq!(
            config.partitions_source(),
            Path::new("/proj/partitions/auto_partitions.csv")
        );
        assert_eq!(config.build_dir(), Path::new("/proj/build"));
        assert_eq!(config.firmware_dir(), Path::new("/proj/build/firmware"));
        assert_eq!(config.reserved_partitions().len(), 2);
        assert_eq!(
            config.partition_limits(),
            [
                PartitionLimit::at("primary_bootloader", 0),
                PartitionLimit::exists("usr_config"),
            ]
        );
    }

    #[test]
    fn test_defaults_and_overrides() {
        let toml = "[project]\nname = \"x\"\npartitions = \"p.csv\"\nflash_capacity = 65536\n";
        let mut config = ProjectConfig::from_toml_str(toml, "").unwrap();
        assert_eq!(config.flash_capacity(), 0x10000);
        assert!(!config.crc_enabled());
        assert!(config.partition_limits().is_empty());

        config.set_flash_capacity(DEFAULT_FLASH_CAPACITY);
        config.set_crc_enable(true);
        assert_eq!(config.flash_capacity(), DEFAULT_FLASH_CAPACITY);
        assert!(config.crc_enabled());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let toml = "[project]\nname = \"x\"\npartitions = \"p.csv\"\ncolour = \"red\"\n";
        let err = ProjectConfig::from_toml_str(toml, "").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);

        let toml = "[project]\nname = \"x\"\npartitions = \"p.csv\"\nflash_capacity = \"8Q\"\n";
        assert!(ProjectConfig::from_toml_str(toml, "").is_err());
    }

    #[test]
    fn test_context_paths() {
        let config = ProjectConfig::from_toml_str(PROJECT, "/proj").unwrap();
        let ctx = BuildContext::new(&config);
        assert_eq!(ctx.platform().name(), "app");
        assert_eq!(
            ctx.partitions_json(),
            Path::new("/proj/build/partitions/partitions.json")
        );
        assert_eq!(
            ctx.ota_json(),
            Path::new("/proj/build/partitions/bk_ota_partitions.json")
        );
        assert_eq!(
            ctx.all_app_bin(),
            Path::new("/proj/build/package/all-app.bin")
        );
        assert_eq!(ctx.summary(), Path::new("/proj/build/build_summary.txt"));
    }
}

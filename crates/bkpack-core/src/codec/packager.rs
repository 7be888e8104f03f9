//! Descriptor driven packager

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::string::String;
use std::vec::Vec;

use crate::descriptor::PackageDescriptor;
use crate::output::{read_required, write_atomic};
use crate::{Error, Result};

use super::linker::{check_overlaps, link, Encoding, LinkMode, PackStrategy, Section, StartPadding};

/// Default name of the packed image
pub const ALL_APP_BIN: &str = "all-app.bin";

#[derive(Debug, Clone)]
struct Placement {
    firmware: String,
    start: u32,
    size: u32,
}

/// Links the firmware of a [`PackageDescriptor`] into one image
///
/// Firmware files are looked up in a work directory. Everything that can
/// be checked without reading firmware (work directory, descriptor,
/// section overlaps) is checked on construction.
#[derive(Debug)]
pub struct Packager {
    workdir: PathBuf,
    strategy: PackStrategy,
    placements: Vec<Placement>,
    overrides: BTreeMap<String, Vec<u8>>,
}

impl Packager {
    /// Open a descriptor file; encoding follows its `crc_enable`
    pub fn open(workdir: impl AsRef<Path>, config: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref();
        check_workdir(workdir)?;
        let descriptor = PackageDescriptor::from_file(config)?;
        Self::new(workdir, &descriptor)
    }

    /// Build from an in-memory descriptor
    pub fn new(workdir: impl AsRef<Path>, descriptor: &PackageDescriptor) -> Result<Self> {
        let workdir = workdir.as_ref();
        check_workdir(workdir)?;

        let placements = descriptor
            .section
            .iter()
            .map(|s| {
                Ok(Placement {
                    firmware: s.firmware.clone(),
                    start: s.start()?,
                    size: s.size_bytes()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let probe: Vec<Section<'_>> = placements
            .iter()
            .map(|p| Section {
                firmware: &p.firmware,
                start: p.start,
                size: p.size,
                data: &[],
            })
            .collect();
        check_overlaps(&probe)?;

        let encoding = if descriptor.crc_enable {
            Encoding::Crc
        } else {
            Encoding::Plain
        };

        Ok(Self {
            workdir: workdir.to_path_buf(),
            strategy: PackStrategy::linear(encoding),
            placements,
            overrides: BTreeMap::new(),
        })
    }

    /// Select linear or format placement
    pub fn link_mode(mut self, link: LinkMode) -> Self {
        self.strategy.link = link;
        self
    }

    /// Select where a linear image starts
    pub fn start_padding(mut self, start: StartPadding) -> Self {
        self.strategy.start_padding = start;
        self
    }

    /// Override the payload encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.strategy.encoding = encoding;
        self
    }

    /// Use `data` instead of reading `firmware` from the work directory
    pub fn with_firmware(mut self, firmware: impl Into<String>, data: Vec<u8>) -> Self {
        self.overrides.insert(firmware.into(), data);
        self
    }

    /// Strategy in effect
    pub fn strategy(&self) -> PackStrategy {
        self.strategy
    }

    /// Link all firmware into an image
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut loaded = Vec::with_capacity(self.placements.len());
        for placement in &self.placements {
            let data = match self.overrides.get(&placement.firmware) {
                Some(data) => data.clone(),
                None => read_required("firmware", &self.workdir.join(&placement.firmware))?,
            };
            log::debug!(
                "{}: {} bytes at 0x{:08x} (partition size 0x{:x})",
                placement.firmware,
                data.len(),
                placement.start,
                placement.size
            );
            loaded.push(data);
        }

        let sections: Vec<Section<'_>> = self
            .placements
            .iter()
            .zip(&loaded)
            .map(|(p, data)| Section {
                firmware: &p.firmware,
                start: p.start,
                size: p.size,
                data,
            })
            .collect();
        link(&sections, self.strategy)
    }

    /// Pack and write the image to `output`, returning its length
    pub fn pack_to_file(&self, output: &Path) -> Result<usize> {
        let image = self.pack()?;
        write_atomic(output, &image)?;
        log::info!("packed {} bytes into {}", image.len(), output.display());
        Ok(image.len())
    }
}

fn check_workdir(workdir: &Path) -> Result<()> {
    if workdir.is_dir() {
        Ok(())
    } else {
        Err(Error::ConfigMissing {
            what: "work directory",
            path: workdir.to_path_buf(),
        })
    }
}

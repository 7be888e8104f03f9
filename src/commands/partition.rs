//! Partition table and header commands

use bkpack_core::descriptor::LayoutDescriptor;
use bkpack_core::manifest::LayoutManifest;
use bkpack_core::output::write_atomic;
use bkpack_core::partition::PartitionLimit;
use bkpack_core::pipeline::partition_stage;
use bkpack_core::project::{BuildContext, Platform, ProjectConfig, DEFAULT_FLASH_CAPACITY};
use std::path::{Path, PathBuf};

/// A table given on the command line, without a project file
struct TablePlatform {
    table: PathBuf,
    flash_capacity: u32,
    crc_enable: bool,
    out_dir: PathBuf,
}

impl Platform for TablePlatform {
    fn name(&self) -> &str {
        "partition"
    }

    fn flash_capacity(&self) -> u32 {
        self.flash_capacity
    }

    fn crc_enabled(&self) -> bool {
        self.crc_enable
    }

    fn ab_enabled(&self) -> bool {
        false
    }

    fn partitions_source(&self) -> &Path {
        &self.table
    }

    fn reserved_partitions(&self) -> &[String] {
        &[]
    }

    fn partition_limits(&self) -> &[PartitionLimit] {
        &[]
    }

    fn build_dir(&self) -> &Path {
        &self.out_dir
    }

    fn firmware_dir(&self) -> &Path {
        &self.out_dir
    }
}

fn run(platform: &dyn Platform) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = BuildContext::new(platform);
    let table = partition_stage(&ctx)?;

    print!("{}", table.to_pretty_table());
    println!();
    println!(
        "{} partitions, flash {} ({}), CRC {}",
        table.len(),
        table.flash_capacity(),
        super::format_size(table.flash_capacity() as usize),
        if table.crc_enable() { "on" } else { "off" }
    );
    println!("Wrote artifacts to {}", ctx.partitions_dir().display());
    Ok(())
}

/// Build a table given directly on the command line
pub fn cmd_table(
    table: &Path,
    flash_capacity: Option<u32>,
    crc: bool,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let platform = TablePlatform {
        table: table.to_path_buf(),
        flash_capacity: flash_capacity.unwrap_or(DEFAULT_FLASH_CAPACITY),
        crc_enable: crc,
        out_dir: out_dir.to_path_buf(),
    };
    run(&platform)
}

/// Build the table of a project, with optional overrides
pub fn cmd_project(
    config: &Path,
    flash_capacity: Option<u32>,
    crc: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut project = ProjectConfig::from_toml_file(config)?;
    if let Some(capacity) = flash_capacity {
        project.set_flash_capacity(capacity);
    }
    if crc {
        project.set_crc_enable(true);
    }
    run(&project)
}

/// Render the C header from a layout manifest
pub fn cmd_header(manifest: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = LayoutManifest::from_file(manifest)?;
    let header = LayoutDescriptor::new(&manifest).render_header();

    match output {
        Some(path) => {
            write_atomic(path, header.as_bytes())?;
            println!("Saved header to {}", path.display());
        }
        None => print!("{}", header),
    }
    Ok(())
}

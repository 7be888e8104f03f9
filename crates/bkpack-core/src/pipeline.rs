//! Build pipeline
//!
//! Runs the stages strictly in order, each one reading the files the
//! previous one wrote:
//!
//! 1. [`partition_stage`]: table → manifest, CSV, pretty table, header,
//!    package descriptor
//! 2. [`ota_stage`]: manifest → OTA descriptor (and AB configuration)
//! 3. [`package_stage`]: OTA descriptor + firmware → bootloader with
//!    attached table, packed flash image
//!
//! Any failure aborts the run. Every stage computes all of its outputs
//! before writing the first one.

use std::path::PathBuf;
use std::vec::Vec;

use crate::codec::{LinkMode, Packager};
use crate::descriptor::{firmware_name, LayoutDescriptor, PackageDescriptor, BOOTLOADER};
use crate::manifest::LayoutManifest;
use crate::ota::{attach_to_bootloader, serialize_table, OtaDescriptor, OtaMode, OtaTransformer};
use crate::output::{read_required, write_atomic};
use crate::partition::PartitionTable;
use crate::project::{BuildContext, Platform};
use crate::summary::BuildSummary;
use crate::Result;

/// What a full build produced
#[derive(Debug)]
pub struct BuildReport {
    /// Validated partition table
    pub table: PartitionTable,
    /// Length of the packed flash image
    pub image_len: usize,
    /// Summary, also written to disk
    pub summary: BuildSummary,
}

fn write_all(outputs: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    for (path, contents) in outputs {
        write_atomic(path, contents)?;
        log::info!("save {}", path.display());
    }
    Ok(())
}

/// Build and validate the partition table and write its artifacts
pub fn partition_stage(ctx: &BuildContext<'_>) -> Result<PartitionTable> {
    let platform = ctx.platform();
    let mut table = PartitionTable::from_csv_file(
        platform.partitions_source(),
        platform.flash_capacity(),
        platform.crc_enabled(),
    )?;
    table.apply_default_setting(platform.partition_limits())?;
    if !platform.reserved_partitions().is_empty() {
        table.reassign_reserved_ids(platform.reserved_partitions());
    }

    let manifest = table.to_manifest();
    let descriptor = LayoutDescriptor::new(&manifest);

    write_all(&[
        (ctx.partitions_csv(), table.to_csv_string().into_bytes()),
        (ctx.partitions_txt(), table.to_pretty_table().into_bytes()),
        (ctx.partitions_json(), manifest.to_json_string()?.into_bytes()),
        (ctx.header(), descriptor.render_header().into_bytes()),
        (
            ctx.package_json(),
            descriptor.package_descriptor().to_json_string()?.into_bytes(),
        ),
    ])?;
    Ok(table)
}

/// Derive the OTA descriptor from the written manifest
pub fn ota_stage(ctx: &BuildContext<'_>) -> Result<OtaDescriptor> {
    let manifest = LayoutManifest::from_file(ctx.partitions_json())?;
    let transformer = OtaTransformer::new(&manifest);

    let mode = if ctx.platform().ab_enabled() {
        OtaMode::DualBank
    } else {
        OtaMode::Single
    };
    let descriptor = transformer.descriptor(mode)?;

    let mut outputs = Vec::new();
    outputs.push((ctx.ota_json(), descriptor.to_json_string()?.into_bytes()));
    if mode == OtaMode::DualBank {
        let config = transformer.ab_configuration()?;
        outputs.push((ctx.ab_config_json(), config.to_json_string()?.into_bytes()));
    }
    write_all(&outputs)?;
    Ok(descriptor)
}

/// Attach the OTA table to the bootloader and pack the flash image
///
/// Source firmware is only read; the bootloader with its table is
/// written to the package directory.
pub fn package_stage(ctx: &BuildContext<'_>) -> Result<usize> {
    let firmware_dir = ctx.platform().firmware_dir();
    let ota = OtaDescriptor::from_file(ctx.ota_json())?;
    let package = PackageDescriptor::from_file(ctx.package_json())?;

    let table = serialize_table(&ota)?;
    let bootloader_name = firmware_name(BOOTLOADER);
    let bootloader = read_required("firmware", &firmware_dir.join(&bootloader_name))?;
    let bootloader = attach_to_bootloader(&bootloader, &table);

    let image = Packager::new(firmware_dir, &package)?
        .link_mode(LinkMode::Linear)
        .with_firmware(bootloader_name, bootloader.clone())
        .pack()?;

    write_all(&[
        (ctx.bootloader_bin(), bootloader),
        (ctx.all_app_bin(), image.clone()),
    ])?;
    Ok(image.len())
}

/// Run every stage and write the build summary
pub fn build(platform: &dyn Platform) -> Result<BuildReport> {
    let ctx = BuildContext::new(platform);
    log::info!("build {}", platform.name());

    let table = partition_stage(&ctx)?;
    ota_stage(&ctx)?;
    let image_len = package_stage(&ctx)?;

    let mut summary = BuildSummary::new();
    summary.set_partitions(table.to_pretty_table());
    summary.add_output("partition table", ctx.partitions_txt());
    summary.add_output("partition header", ctx.header());
    summary.add_output("ota partitions", ctx.ota_json());
    if platform.ab_enabled() {
        summary.add_output("ab configuration", ctx.ab_config_json());
    }
    summary.add_output("bootloader", ctx.bootloader_bin());
    summary.add_output("all-app", ctx.all_app_bin());

    write_atomic(&ctx.summary(), summary.render().as_bytes())?;
    log::info!("save build summary to {}", ctx.summary().display());

    Ok(BuildReport {
        table,
        image_len,
        summary,
    })
}

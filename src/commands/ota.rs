//! OTA table commands

use bkpack_core::descriptor::PackageDescriptor;
use bkpack_core::ota::{
    app_image, attach_to_bootloader, serialize_table, OtaDescriptor, OtaMode, OtaRecord,
    OtaTransformer, ATTACH_ALIGN, OTA_RECORD_SIZE,
};
use bkpack_core::output::{read_required, write_atomic};
use std::fs;
use std::path::Path;

/// Derive the OTA descriptor (and AB configuration) from a manifest
pub fn cmd_json(
    manifest: &Path,
    output: &Path,
    ab: bool,
    ab_config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let transformer = OtaTransformer::from_file(manifest)?;
    let mode = if ab { OtaMode::DualBank } else { OtaMode::Single };
    let descriptor = transformer.descriptor(mode)?;

    // Render everything before the first write
    let json = descriptor.to_json_string()?;
    let config = match ab_config {
        Some(path) => Some((path, transformer.ab_configuration()?.to_json_string()?)),
        None => None,
    };

    write_atomic(output, json.as_bytes())?;
    println!(
        "Saved {} OTA partitions to {}",
        descriptor.part_table.len(),
        output.display()
    );
    if let Some((path, json)) = config {
        write_atomic(path, json.as_bytes())?;
        println!("Saved AB configuration to {}", path.display());
    }
    Ok(())
}

/// Attach the table of an OTA descriptor to a bootloader image
pub fn cmd_attach(
    ota_json: &Path,
    bootloader: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = OtaDescriptor::from_file(ota_json)?;
    let table = serialize_table(&descriptor)?;
    let bootloader = read_required("bootloader", bootloader)?;

    let image = attach_to_bootloader(&bootloader, &table);
    write_atomic(output, &image)?;
    println!(
        "Attached {} records ({} bytes) at {:#x}, saved {} bytes to {}",
        descriptor.part_table.len(),
        table.len(),
        image.len() - table.len(),
        image.len(),
        output.display()
    );
    Ok(())
}

/// Find the first 32-byte aligned offset holding a valid record
fn find_table(data: &[u8]) -> Option<usize> {
    (0..data.len())
        .step_by(ATTACH_ALIGN)
        .find(|&offset| OtaRecord::parse(&data[offset..]).is_ok())
}

/// Decode and print an attached OTA table
pub fn cmd_show(input: &Path, offset: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let start = match offset {
        Some(offset) => offset as usize,
        None => find_table(&data).ok_or("No OTA table found in image")?,
    };
    let blob = data
        .get(start..)
        .ok_or_else(|| format!("Offset {:#x} is past the end of the file", start))?;
    let blob = &blob[..blob.len() - blob.len() % OTA_RECORD_SIZE];

    println!("OTA Table at {:#x}", start);
    println!("==================");
    println!(
        "{:<24} {:<24} {:>10} {:>10} {:>10}",
        "Name", "Flash", "Offset", "Size", "CRC"
    );
    println!("{:-<82}", "");

    let mut count = 0;
    for record in OtaRecord::parse_blob(blob)? {
        let record = match record {
            Ok(record) => record,
            // Trailing bytes after the last record
            Err(_) if count > 0 && offset.is_none() => break,
            Err(e) => return Err(e.into()),
        };
        println!(
            "{:<24} {:<24} {:#010X} {:>10} {:#010X}",
            record.name(),
            record.flash_name(),
            record.offset(),
            super::format_size(record.size() as usize),
            record.crc()
        );
        count += 1;
    }
    println!("\n{} records", count);
    Ok(())
}

/// Link the OTA application image
pub fn cmd_app_image(
    config: &Path,
    workdir: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = PackageDescriptor::from_file(config)?;
    let image = app_image(&descriptor, workdir)?;
    write_atomic(output, &image)?;
    println!("Saved {} bytes to {}", image.len(), output.display());
    Ok(())
}

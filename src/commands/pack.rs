//! Image packing command

use bkpack_core::codec::{LinkMode, Packager, StartPadding, ALL_APP_BIN};
use std::path::Path;

/// Link the firmware named by a package descriptor
pub fn cmd_pack(
    config: &Path,
    workdir: &Path,
    output: Option<&Path>,
    format: bool,
    trim_start: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut packager = Packager::open(workdir, config)?;
    if format {
        packager = packager.link_mode(LinkMode::Format);
    }
    if trim_start {
        packager = packager.start_padding(StartPadding::FromFirstSection);
    }

    let default_output = workdir.join(ALL_APP_BIN);
    let output = output.unwrap_or(default_output.as_path());
    let strategy = packager.strategy();
    log::debug!("pack strategy: {:?}", strategy);

    let len = packager.pack_to_file(output)?;
    println!(
        "Packed {} bytes ({}) to {}",
        len,
        super::format_size(len),
        output.display()
    );
    Ok(())
}

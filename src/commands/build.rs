//! Whole-pipeline command

use bkpack_core::pipeline::build;
use bkpack_core::project::{Platform, ProjectConfig};
use std::path::Path;

/// Run every stage for a project and print the summary
pub fn cmd_build(config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let project = ProjectConfig::from_toml_file(config)?;
    if let Some(soc) = project.soc() {
        log::info!("target {}", soc);
    }

    let report = build(&project)?;
    print!("{}", report.summary.render());
    println!(
        "\n{}: {} partitions, image {} bytes ({})",
        project.name(),
        report.table.len(),
        report.image_len,
        super::format_size(report.image_len)
    );
    Ok(())
}

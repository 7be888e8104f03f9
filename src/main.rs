//! bkpack - Flash layout and image packager
//!
//! Turns a partition table into the layout artifacts a firmware build
//! consumes, links per-partition binaries into a flash image and attaches
//! the OTA partition table to the bootloader.
//!
//! Every step is available as its own subcommand; `build` runs them all
//! in order for a project described by `bkpack.toml`.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, CrcCommands, OtaCommands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Partition {
            table,
            flash_capacity,
            crc,
            out_dir,
            config,
        } => match config {
            Some(config) => commands::partition::cmd_project(&config, flash_capacity, crc),
            None => {
                let table = table.ok_or("--table or --config is required")?;
                commands::partition::cmd_table(&table, flash_capacity, crc, &out_dir)
            }
        },
        Commands::Header { manifest, output } => {
            commands::partition::cmd_header(&manifest, output.as_deref())
        }
        Commands::Pack {
            config,
            workdir,
            output,
            format,
            trim_start,
        } => commands::pack::cmd_pack(&config, &workdir, output.as_deref(), format, trim_start),
        Commands::Ota(subcmd) => match subcmd {
            OtaCommands::Json {
                manifest,
                output,
                ab,
                ab_config,
            } => commands::ota::cmd_json(&manifest, &output, ab, ab_config.as_deref()),
            OtaCommands::Attach {
                ota_json,
                bootloader,
                output,
            } => commands::ota::cmd_attach(&ota_json, &bootloader, &output),
            OtaCommands::Show { input, offset } => commands::ota::cmd_show(&input, offset),
            OtaCommands::AppImage {
                config,
                workdir,
                output,
            } => commands::ota::cmd_app_image(&config, &workdir, &output),
        },
        Commands::Crc(subcmd) => match subcmd {
            CrcCommands::Encode { input, output } => commands::crc::cmd_encode(&input, &output),
            CrcCommands::Decode { input, output } => commands::crc::cmd_decode(&input, &output),
        },
        Commands::Addr {
            address,
            to_virtual,
        } => {
            commands::crc::cmd_addr(address, to_virtual);
            Ok(())
        }
        Commands::Build { config } => commands::build::cmd_build(&config),
    }
}

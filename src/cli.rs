//! CLI argument parsing

use bkpack_core::size::{parse_number, parse_size};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a hex or decimal u32
fn parse_u32(s: &str) -> Result<u32, String> {
    parse_number(s).map_err(|e| e.to_string())
}

/// Parse a human size such as `4M`, `68K` or `0x1000`
fn parse_capacity(s: &str) -> Result<u32, String> {
    parse_size(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "bkpack")]
#[command(author, version, about = "Flash layout and image packager", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the partition table and write its artifacts
    Partition {
        /// Partition table (CSV)
        #[arg(short, long, required_unless_present = "config", conflicts_with = "config")]
        table: Option<PathBuf>,

        /// Flash capacity, unless the table overrides it
        #[arg(long, value_parser = parse_capacity)]
        flash_capacity: Option<u32>,

        /// Enable CRC mode
        #[arg(long)]
        crc: bool,

        /// Output directory
        #[arg(short, long, default_value = "build", conflicts_with = "config")]
        out_dir: PathBuf,

        /// Project file (bkpack.toml) to take table, limits and reserved names from
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render the C header from a layout manifest
    Header {
        /// Layout manifest (partitions.json)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Link per-partition firmware into one flash image
    Pack {
        /// Package descriptor (bk_package.json)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory holding the firmware files
        #[arg(short, long)]
        workdir: PathBuf,

        /// Output image (defaults to <workdir>/all-app.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concatenate payloads instead of placing them at their addresses
        #[arg(long)]
        format: bool,

        /// Start the image at the first section instead of address 0
        #[arg(long)]
        trim_start: bool,
    },

    /// OTA partition table operations
    #[command(subcommand)]
    Ota(OtaCommands),

    /// CRC block encoding
    #[command(subcommand)]
    Crc(CrcCommands),

    /// Translate between logical and physical addresses
    Addr {
        /// Address (hex or decimal)
        #[arg(value_parser = parse_u32)]
        address: u32,

        /// Treat the address as physical and translate it back
        #[arg(long)]
        to_virtual: bool,
    },

    /// Run the whole pipeline for a project
    Build {
        /// Project file
        #[arg(short, long, default_value = "bkpack.toml")]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum OtaCommands {
    /// Derive the OTA descriptor from a layout manifest
    Json {
        /// Layout manifest (partitions.json)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output OTA descriptor
        #[arg(short, long)]
        output: PathBuf,

        /// Use the AB (dual bank) layout
        #[arg(long)]
        ab: bool,

        /// Also write the AB configuration descriptor here
        #[arg(long, requires = "ab")]
        ab_config: Option<PathBuf>,
    },

    /// Attach the OTA table to a bootloader
    Attach {
        /// OTA descriptor (bk_ota_partitions.json)
        #[arg(long)]
        ota_json: PathBuf,

        /// Bootloader image
        #[arg(short, long)]
        bootloader: PathBuf,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode and verify an attached OTA table
    Show {
        /// Table blob or bootloader with an attached table
        #[arg(short, long)]
        input: PathBuf,

        /// Byte offset of the table (searched for if not specified)
        #[arg(long, value_parser = parse_u32)]
        offset: Option<u32>,
    },

    /// Link the application image an OTA update carries
    AppImage {
        /// Package descriptor (bk_package.json)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory holding the firmware files
        #[arg(short, long)]
        workdir: PathBuf,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum CrcCommands {
    /// Insert a CRC-16 after every 32 bytes
    Encode {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify and strip the per-block CRC-16
    Decode {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_partition_args() {
        let cli = Cli::try_parse_from([
            "bkpack",
            "partition",
            "--table",
            "auto_partitions.csv",
            "--flash-capacity",
            "4M",
            "--crc",
        ])
        .unwrap();
        match cli.command {
            Commands::Partition {
                table,
                flash_capacity,
                crc,
                out_dir,
                config,
            } => {
                assert_eq!(table, Some(PathBuf::from("auto_partitions.csv")));
                assert_eq!(flash_capacity, Some(4 * 1024 * 1024));
                assert!(crc);
                assert_eq!(out_dir, PathBuf::from("build"));
                assert!(config.is_none());
            }
            _ => panic!("expected partition"),
        }

        // Either a table or a project file
        assert!(Cli::try_parse_from(["bkpack", "partition"]).is_err());
        assert!(Cli::try_parse_from([
            "bkpack", "partition", "--table", "a.csv", "--config", "bkpack.toml"
        ])
        .is_err());
    }

    #[test]
    fn test_addr_and_ota_args() {
        let cli = Cli::try_parse_from(["bkpack", "-vv", "addr", "0x1000", "--to-virtual"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Addr {
                address: 0x1000,
                to_virtual: true
            }
        ));

        // --ab-config only makes sense with --ab
        assert!(Cli::try_parse_from([
            "bkpack", "ota", "json", "-m", "p.json", "-o", "o.json", "--ab-config", "ab.json"
        ])
        .is_err());
    }
}

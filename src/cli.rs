//! CLI definitions using clap derive API

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// lld-forge - switch configs from an LLD workbook
#[derive(Parser, Debug)]
#[command(
    name = "lld-forge",
    author,
    version,
    about = "Generate switch configurations from an LLD spreadsheet",
    after_help = "Examples:\n    \
                  lld-forge lld --name DC1_LLD.xlsx\n    \
                  lld-forge init\n    \
                  lld-forge run -v"
)]
pub struct Cli {
    /// Settings file (defaults to $LLD_FORGE_SETTINGS or settings/settings.yaml)
    #[arg(long, short = 's', global = true)]
    pub settings: Option<PathBuf>,

    /// Enable debug output on the console
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract the LLD and (re)generate the device data file and device snapshot
    Init,

    /// Generate one config file per device
    Run,

    /// Set which LLD workbook to use
    Lld(LldArgs),
}

/// Arguments for the lld command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["name", "file"])))]
pub struct LldArgs {
    /// Workbook file name inside the data directory
    #[arg(long)]
    pub name: Option<String>,

    /// Explicit path to the workbook
    #[arg(long)]
    pub file: Option<PathBuf>,
}

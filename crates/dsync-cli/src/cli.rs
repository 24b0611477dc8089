use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dsync",
    about = "Load policy documents and modules from a directory service",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the directory and run one sync cycle
    Run(RunArgs),
    /// Parse and compile policy module files
    Check(CheckArgs),
    /// Validate and print a configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Configuration file (JSON or TOML)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Print the store contents after a successful sync
    #[arg(long)]
    pub dump: bool,
    /// Verify the server certificate during StartTLS
    #[arg(long)]
    pub verify_tls: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(short, long)]
    pub config: PathBuf,
}

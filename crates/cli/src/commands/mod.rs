use std::path::PathBuf;

use blockzip::{BlockFailureMode, PipelineConfig, RunSummary};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

/// Command handlers for the Blockzip CLI.
///
/// Each submodule implements one operation on a pair of files.
/// Compress command module.
mod compress;
/// Decompress command module.
mod decompress;

/// The CLI for Blockzip.
///
/// Compresses a file into a multi-member gzip archive using a pool of worker threads, or
/// restores a file from an archive written that way.
///
/// # Examples
///
/// ```bash
/// blockzip compress data.bin data.bin.gz
/// blockzip --workers 8 decompress data.bin.gz data.bin
/// ```
#[derive(Parser)]
#[command(name = "blockzip", version)]
pub struct Cli {
    #[command(subcommand)]
    /// The subcommand to execute.
    pub command: Commands,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (can be used multiple times: -v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Append logs to this file instead of standard output
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Pipeline settings
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Pipeline settings shared by every command.
///
/// Values given on the command line override the ones loaded from `--config`.
#[derive(Args, Clone, Debug, Default)]
pub struct PipelineArgs {
    /// JSON configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config:     Option<PathBuf>,
    /// Number of worker threads (defaults to the processor count)
    #[arg(short, long, value_name = "COUNT", global = true)]
    pub workers:    Option<usize>,
    /// Block size in bytes; decompression must use the size the archive was written with
    #[arg(short, long, value_name = "BYTES", global = true)]
    pub block_size: Option<usize>,
    /// Deflate compression level (0-9)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub level:      Option<u32>,
    /// Abort the run when a block fails instead of leaving it out
    #[arg(long, global = true)]
    pub strict:     bool,
}

impl PipelineArgs {
    /// Build the pipeline configuration from the optional config file and the flag overrides.
    pub fn resolve(&self) -> blockzip::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                PipelineConfig::from_file(path)?
            },
            None => PipelineConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(level) = self.level {
            config.compression_level = level;
        }
        if self.strict {
            config.failure_mode = BlockFailureMode::Strict;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Enumeration of all available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Compress a file into a multi-member gzip archive.
    ///
    /// Every block of the input becomes one gzip member, so the archive can be read by any
    /// gzip tool.
    #[command(visible_alias = "c")]
    Compress(compress::CompressArgs),
    /// Decompress an archive written by the compress command.
    ///
    /// The block size must match the one used for compression.
    #[command(visible_alias = "d")]
    Decompress(decompress::DecompressArgs),
}

/// Execute the specified CLI command with the resolved configuration.
///
/// # Returns
/// Returns the summary of the run on success.
pub fn run_command(command: Commands, config: PipelineConfig) -> blockzip::Result<RunSummary> {
    match command {
        Commands::Compress(args) => compress::run(args, config),
        Commands::Decompress(args) => decompress::run(args, config),
    }
}

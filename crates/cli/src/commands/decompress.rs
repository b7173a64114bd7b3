use std::{fs::File, io::BufWriter, path::PathBuf};

use blockzip::{BlockPipeline, PipelineConfig, RunSummary};
use clap::Args;
use tracing::{error, info};

/// Arguments for the decompress command.
#[derive(Args, Clone, Debug)]
pub struct DecompressArgs {
    /// Archive written by the compress command
    pub input:  PathBuf,
    /// File to restore (overwritten if it exists)
    pub output: PathBuf,
}

/// Decompress the archive `args.input` into `args.output`.
///
/// The archive is checked for the gzip magic before the output file is created.
///
/// # Arguments
/// * `args` - The parsed command-line arguments for decompress.
/// * `config` - The resolved pipeline configuration; its block size must match the archive.
///
/// # Returns
/// Returns the run summary on success.
pub fn run(args: DecompressArgs, config: PipelineConfig) -> blockzip::Result<RunSummary> {
    info!(
        "Decompressing {} into {}",
        args.input.display(),
        args.output.display()
    );

    let mut input = File::open(&args.input)?;
    blockzip::member::validate_archive(&mut input)?;
    let output = BufWriter::new(File::create(&args.output)?);

    let mut pipeline = BlockPipeline::new(config)?;
    let summary = pipeline.decompress(input, output).inspect_err(|e| {
        error!(
            "Decompression of {} failed, {} is incomplete: {}",
            args.input.display(),
            args.output.display(),
            e
        );
    })?;
    pipeline.shutdown()?;

    Ok(summary)
}

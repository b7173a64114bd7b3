use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
};

use blockzip::{BlockPipeline, PipelineConfig, RunSummary};
use clap::Args;
use tracing::{error, info};

/// Arguments for the compress command.
#[derive(Args, Clone, Debug)]
pub struct CompressArgs {
    /// File to compress
    pub input:  PathBuf,
    /// Archive to create (overwritten if it exists)
    pub output: PathBuf,
}

/// Compress `args.input` into the multi-member archive `args.output`.
///
/// The output file is created before any block is compressed. On failure it is left in place
/// and the error names the cause.
///
/// # Arguments
/// * `args` - The parsed command-line arguments for compress.
/// * `config` - The resolved pipeline configuration.
///
/// # Returns
/// Returns the run summary on success.
pub fn run(args: CompressArgs, config: PipelineConfig) -> blockzip::Result<RunSummary> {
    info!(
        "Compressing {} into {}",
        args.input.display(),
        args.output.display()
    );

    let input = File::open(&args.input)?;
    let output = BufWriter::new(File::create(&args.output)?);

    let mut pipeline = BlockPipeline::new(config)?;
    let summary = pipeline.compress(input, output).inspect_err(|e| {
        error!(
            "Compression of {} failed, {} is incomplete: {}",
            args.input.display(),
            args.output.display(),
            e
        );
    })?;
    pipeline.shutdown()?;

    Ok(summary)
}

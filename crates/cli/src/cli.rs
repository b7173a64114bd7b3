use blockzip::{BlockzipError, RunSummary};
use clap::Parser;
use tracing::{info, warn};

use crate::{
    commands::{run_command, Cli},
    logging::init_tracing,
};

/// Run the Blockzip CLI application.
///
/// Parses the command line, initializes tracing, resolves the pipeline configuration and
/// executes the requested command.
///
/// # Returns
/// Returns `Ok(())` when every block made it into the output. A run that left blocks out is
/// reported as an error so the process exits with a non-zero status.
pub fn run() -> blockzip::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, cli.verbose, cli.log_file.as_deref())?;
    info!("{} v{}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));

    let config = cli.pipeline.resolve()?;
    let summary = run_command(cli.command, config)?;

    info!(
        "Finished: {} blocks in {} generations, {} bytes read, {} bytes written",
        summary.blocks, summary.generations, summary.bytes_in, summary.bytes_out
    );
    check_summary(&summary)
}

/// Turn a degraded run into an error.
fn check_summary(summary: &RunSummary) -> blockzip::Result<()> {
    match summary.failed_blocks.first() {
        None => Ok(()),
        Some(&index) => {
            warn!("Blocks left out of the output: {:?}", summary.failed_blocks);
            Err(BlockzipError::block_failure(
                index,
                format!(
                    "{} of {} blocks are missing from the output",
                    summary.failed_blocks.len(),
                    summary.blocks
                ),
            ))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_run_is_ok() {
        let summary = RunSummary {
            blocks: 3,
            ..Default::default()
        };
        assert!(check_summary(&summary).is_ok());
    }

    #[test]
    fn test_degraded_run_is_an_error() {
        let summary = RunSummary {
            blocks: 5,
            failed_blocks: vec![2, 4],
            ..Default::default()
        };
        let err = check_summary(&summary).unwrap_err();
        assert!(matches!(err, BlockzipError::BlockCodecFailure { index: 2, .. }));
        assert!(err.to_string().contains("2 of 5 blocks"));
    }
}

//! Ordered output of a completed generation.

use std::io::Write;

use tracing::{trace, warn};

use crate::{config::BlockFailureMode, pool::BlockSlots, BlockzipError, Result};

/// What one flush wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Blocks written to the output
    pub written: usize,
    /// Run-wide indices of blocks left out because their codec call failed
    pub failed:  Vec<usize>,
    /// Bytes written by this flush
    pub bytes:   u64,
}

/// Writes completed block outputs to the output stream strictly in block-index order.
///
/// The writer never looks at completion order: it is only called once the generation barrier
/// has released, at which point every slot in `0..count` is populated.
#[derive(Debug)]
pub struct OutputWriter<W: Write> {
    inner:         W,
    bytes_written: u64,
}

impl<W: Write> OutputWriter<W> {
    /// Wrap an output stream.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Write the outputs of blocks `0..count` in index order.
    ///
    /// `first_block` is the run-wide index of slot 0, used for logging and failure reports.
    /// In [`BlockFailureMode::Strict`] nothing of the generation is written when one of its
    /// blocks failed.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::BlockCodecFailure` - In strict mode, for the first failed block
    /// * `BlockzipError::Internal` - If a slot is empty (the barrier released too early)
    /// * `BlockzipError::Io` - If writing to the output fails
    pub fn flush(
        &mut self,
        slots: &BlockSlots,
        count: usize,
        mode: BlockFailureMode,
        first_block: usize,
    ) -> Result<FlushReport> {
        let mut outcomes = Vec::with_capacity(count);
        for index in 0 .. count {
            let outcome = slots.take(index).ok_or_else(|| {
                BlockzipError::Internal {
                    message: format!("block {} has no output", first_block + index),
                }
            })?;
            outcomes.push(outcome);
        }

        if mode == BlockFailureMode::Strict {
            if let Some((index, Err(reason))) = outcomes.iter().enumerate().find(|(_, o)| o.is_err()) {
                return Err(BlockzipError::block_failure(first_block + index, reason));
            }
        }

        let mut report = FlushReport::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(bytes) => {
                    self.inner.write_all(&bytes)?;
                    report.written += 1;
                    report.bytes += bytes.len() as u64;
                }
                Err(reason) => {
                    warn!(
                        "Block {} left out of the output: {}",
                        first_block + index,
                        reason
                    );
                    report.failed.push(first_block + index);
                }
            }
        }

        self.bytes_written += report.bytes;
        trace!("Flushed {} blocks ({} bytes)", report.written, report.bytes);
        Ok(report)
    }

    /// Total bytes written so far.
    pub const fn bytes_written(&self) -> u64 { self.bytes_written }

    /// Flush the underlying stream and hand it back.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

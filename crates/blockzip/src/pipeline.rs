//! The block pipeline: one producer, a fixed worker pool and a generation barrier.
//!
//! [`BlockPipeline`] is the context threaded through every run. It owns the configuration,
//! the codec, the worker pool, the barrier and the per-index block slots; nothing is kept in
//! process-wide state. The compress path lives in `scheduler.rs`, the decompress path in
//! `scanner.rs`; both drive generations through [`BlockPipeline::commit`].

use std::{io::Write, sync::Arc};

use tracing::debug;

use crate::{
    barrier::BatchBarrier,
    codec::{BlockCodec, GzipCodec},
    config::PipelineConfig,
    pool::{BlockSlots, Task, WorkerPool},
    writer::OutputWriter,
    Result,
};

/// Outcome of one compress or decompress run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks scheduled
    pub blocks:        usize,
    /// Generations committed
    pub generations:   usize,
    /// Bytes consumed from the input
    pub bytes_in:      u64,
    /// Bytes written to the output
    pub bytes_out:     u64,
    /// Run-wide indices of blocks left out of the output
    pub failed_blocks: Vec<usize>,
}

impl RunSummary {
    /// Whether every block made it into the output.
    pub fn is_complete(&self) -> bool { self.failed_blocks.is_empty() }
}

/// Parallel block compressor/decompressor.
///
/// The worker pool is started by [`BlockPipeline::new`] and stopped by
/// [`BlockPipeline::shutdown`] (or on drop). A pipeline can run any number of compress and
/// decompress operations in between, one at a time.
#[derive(Debug)]
pub struct BlockPipeline {
    pub(crate) config:  PipelineConfig,
    pub(crate) slots:   Arc<BlockSlots>,
    pub(crate) barrier: Arc<BatchBarrier>,
    pub(crate) pool:    WorkerPool,
}

impl BlockPipeline {
    /// Create a pipeline using the gzip codec at the configured level.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::ConfigError` - If the configuration is invalid
    /// * `BlockzipError::Io` - If worker threads cannot be spawned
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let codec = GzipCodec::new(config.compression_level);
        Self::with_codec(config, Arc::new(codec))
    }

    /// Create a pipeline around a custom block codec.
    pub fn with_codec(config: PipelineConfig, codec: Arc<dyn BlockCodec>) -> Result<Self> {
        config.validate()?;

        let slots = Arc::new(BlockSlots::new(config.workers));
        let barrier = Arc::new(BatchBarrier::new());
        let pool = WorkerPool::new(config.workers, codec, Arc::clone(&slots), Arc::clone(&barrier))?;

        debug!(
            "Pipeline ready: {} workers, {} byte blocks, {} failure mode",
            config.workers, config.block_size, config.failure_mode
        );

        Ok(Self {
            config,
            slots,
            barrier,
            pool,
        })
    }

    /// The configuration this pipeline runs with.
    pub const fn config(&self) -> &PipelineConfig { &self.config }

    /// Stop the worker pool and join its threads.
    pub fn shutdown(mut self) -> Result<()> { self.pool.shutdown() }

    /// Queue a task, abandoning the generation's `enqueued` tasks if the pool refuses it.
    pub(crate) fn submit(&self, task: Task, enqueued: usize) -> Result<()> {
        self.pool.enqueue(task).inspect_err(|_| self.abandon(enqueued))
    }

    /// Wait for the current generation and write its `count` blocks in index order.
    pub(crate) fn commit<W: Write>(
        &self,
        writer: &mut OutputWriter<W>,
        count: usize,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.barrier.wait();
        let report = writer.flush(&self.slots, count, self.config.failure_mode, summary.blocks)?;

        summary.blocks += count;
        summary.generations += 1;
        summary.bytes_out += report.bytes;
        summary.failed_blocks.extend(report.failed);
        debug!(
            "Generation {} committed: {} blocks, {} bytes written",
            summary.generations, count, report.bytes
        );
        Ok(())
    }

    /// Let the `enqueued` tasks of an interrupted generation finish and discard their output.
    pub(crate) fn abandon(&self, enqueued: usize) {
        self.barrier.drain(enqueued);
        for index in 0 .. enqueued {
            let _ = self.slots.take(index);
        }
        debug!("Abandoned generation with {} blocks in flight", enqueued);
    }
}

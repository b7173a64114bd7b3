//! Compress path: split the input into fixed-size blocks and compress one generation at a time.
//!
//! Every block becomes an independent gzip member. Only the last block of the input may be
//! shorter than the block size, which is the property the decompress path relies on.

use std::io::{Read, Seek, Write};

use tracing::{debug, info};

use crate::{
    io::{read_full, remaining_len},
    pipeline::{BlockPipeline, RunSummary},
    pool::Task,
    writer::OutputWriter,
    Result,
};

impl BlockPipeline {
    /// Compress `input` into a multi-member gzip stream written to `output`.
    ///
    /// The input is read in blocks of `block_size` bytes. Up to `workers` blocks form one
    /// generation; the generation is written once all its blocks are compressed, in block
    /// order. An empty input produces a single empty member so the output is always a valid
    /// gzip file.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::Io` - If reading the input or writing the output fails
    /// * `BlockzipError::BlockCodecFailure` - In strict mode, if a block fails to compress
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::fs::File;
    ///
    /// use blockzip::{BlockPipeline, PipelineConfig};
    ///
    /// # fn example() -> blockzip::Result<()> {
    /// let mut pipeline = BlockPipeline::new(PipelineConfig::default())?;
    /// let summary = pipeline.compress(File::open("data.bin")?, File::create("data.bin.gz")?)?;
    /// println!("{} blocks", summary.blocks);
    /// # Ok(())
    /// # }
    /// ```
    pub fn compress<R: Read + Seek, W: Write>(&mut self, mut input: R, output: W) -> Result<RunSummary> {
        let block_size = self.config.block_size;
        let pool_size = self.pool.size();
        let mut remaining = remaining_len(&mut input)?;
        let mut writer = OutputWriter::new(output);
        let mut summary = RunSummary::default();

        info!(
            "Compressing {} bytes in blocks of {} bytes with {} workers",
            remaining, block_size, pool_size
        );

        loop {
            self.barrier.reset(pool_size);
            let mut count = 0;
            let mut last = false;

            while count < pool_size && !last {
                let wanted = if remaining <= block_size as u64 {
                    remaining as usize
                } else {
                    block_size
                };

                let mut block = vec![0_u8; wanted];
                let read = match read_full(&mut input, &mut block) {
                    Ok(read) => read,
                    Err(e) => {
                        self.abandon(count);
                        return Err(e.into());
                    }
                };
                block.truncate(read);
                remaining = remaining.saturating_sub(read as u64);
                summary.bytes_in += read as u64;

                // A short read means the input ended earlier than its reported length.
                last = remaining == 0 || read < wanted;
                if last {
                    self.barrier.set_target(count + 1);
                }

                self.submit(Task::compress(count, block), count)?;
                count += 1;
            }

            debug!("Generation of {} blocks scheduled", count);
            self.commit(&mut writer, count, &mut summary)?;

            if last {
                break;
            }
        }

        writer.finish()?;
        info!(
            "Compressed {} bytes into {} bytes ({} blocks)",
            summary.bytes_in, summary.bytes_out, summary.blocks
        );
        Ok(summary)
    }
}

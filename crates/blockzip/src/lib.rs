//! # Blockzip
//!
//! Block-parallel gzip compression and decompression for large files.
//!
//! ## Architecture
//!
//! The input is split into fixed-size blocks (1 MiB by default). Each block is compressed
//! into an independent gzip member by a fixed pool of worker threads, so the output is a
//! regular multi-member gzip file. Blocks are processed in generations of up to one block
//! per worker:
//!
//! - the producer reads blocks and queues one task per block index
//! - workers run the codec and report each completion to a generation barrier
//! - once every block of the generation completed, the producer writes the outputs in block
//!   order and starts the next generation
//!
//! At most one generation is in flight, which bounds memory to `workers` input and output
//! blocks. Decompression recovers block boundaries by scanning for the gzip magic triplet
//! preceded by an ISIZE trailer equal to the block size.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//!
//! use blockzip::{BlockPipeline, PipelineConfig};
//!
//! # fn example() -> blockzip::Result<()> {
//! let mut pipeline = BlockPipeline::new(PipelineConfig::default())?;
//! pipeline.compress(File::open("input.bin")?, File::create("input.bin.gz")?)?;
//! pipeline.decompress(File::open("input.bin.gz")?, File::create("restored.bin")?)?;
//! pipeline.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod member;
pub mod pipeline;
pub mod pool;
pub mod scanner;
pub mod scheduler;
pub mod writer;

pub use barrier::BatchBarrier;
pub use codec::{BlockCodec, GzipCodec};
pub use config::{BlockFailureMode, PipelineConfig};
pub use constants::{DEFAULT_BLOCK_SIZE, GZIP_MAGIC, SCAN_MARGIN};
pub use error::{BlockzipError, Result};
pub use pipeline::{BlockPipeline, RunSummary};
pub use pool::{BlockSlots, Operation, Task, WorkerPool};
pub use scanner::{find_boundary, ScanCursor};
pub use writer::{FlushReport, OutputWriter};

//! Single-block codecs used by the worker pool.

pub mod gzip;

pub use gzip::GzipCodec;

use crate::Result;

/// Trait for codecs that turn one block into one standalone gzip member and back.
///
/// Implementations are shared by every worker, so they must be `Send + Sync` and must not
/// keep per-call state behind `&self`.
pub trait BlockCodec: Send + Sync {
    /// Compress one block into a complete gzip member (header, deflate data, trailer).
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress exactly one gzip member, producing exactly `expected_len` bytes.
    fn decompress(&self, member: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

//! Constants shared by the compress and decompress paths.
//!
//! The block size and scan margin define the on-disk convention of blockzip archives: every
//! non-final member decompresses to exactly [`DEFAULT_BLOCK_SIZE`] bytes, which is what the
//! boundary scanner relies on when it splits a concatenated archive back into blocks.

/// Default uncompressed size of one block (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Extra bytes read past one block when scanning for member boundaries.
///
/// A stored (incompressible) block grows by its deflate framing plus the gzip header and
/// trailer; the margin keeps the next member's header inside the same scan window.
pub const SCAN_MARGIN: usize = 375;

/// The gzip magic triplet: ID1, ID2 and the deflate compression method.
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Length of the ISIZE trailer field (uncompressed size modulo 2^32).
pub const ISIZE_LEN: usize = 4;

/// Fixed gzip header (10 bytes) plus trailer (8 bytes). No member can be shorter.
pub const MIN_MEMBER_LEN: usize = 18;

/// Default deflate level used for each block.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

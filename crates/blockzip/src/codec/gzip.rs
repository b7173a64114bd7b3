//! GZIP block codec backed by `flate2`.
//!
//! Every block becomes one self-contained member with its own header and CRC32/ISIZE trailer,
//! so the concatenated output is a regular multi-member gzip file that any gzip tool can read.

use std::io::{Read as _, Write as _};

use flate2::{bufread::GzDecoder, write::GzEncoder, Compression};

use crate::{codec::BlockCodec, BlockzipError, Result};

/// GZIP codec
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: Compression,
}

impl GzipCodec {
    /// Create a codec compressing at the given deflate level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for GzipCodec {
    fn default() -> Self { Self::new(crate::constants::DEFAULT_COMPRESSION_LEVEL) }
}

impl BlockCodec for GzipCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), self.level);
        encoder
            .write_all(data)
            .map_err(|e| BlockzipError::Internal {
                message: format!("GZIP compression error: {}", e),
            })?;
        encoder.finish().map_err(|e| {
            BlockzipError::Internal {
                message: format!("GZIP compression error: {}", e),
            }
        })
    }

    fn decompress(&self, member: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        // bufread::GzDecoder stops at the end of the first member and leaves the rest unread.
        let mut decoder = GzDecoder::new(member);
        let mut decompressed: Vec<u8> = Vec::with_capacity(expected_len);
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| BlockzipError::Internal {
                message: format!("GZIP decompression error: {}", e),
            })?;

        if decompressed.len() != expected_len {
            return Err(BlockzipError::Internal {
                message: format!(
                    "GZIP decompression produced {} bytes, expected {}",
                    decompressed.len(),
                    expected_len
                ),
            });
        }

        let trailing = decoder.into_inner().len();
        if trailing != 0 {
            return Err(BlockzipError::Internal {
                message: format!("{} unexpected bytes after the gzip member", trailing),
            });
        }

        Ok(decompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GZIP_MAGIC;

    #[test]
    fn test_compress_produces_single_member() {
        let codec = GzipCodec::default();
        let data = b"hello hello hello hello".repeat(10);

        let member = codec.compress(&data).unwrap();
        assert_eq!(&member[.. 3], &GZIP_MAGIC);
        let isize = u32::from_le_bytes(member[member.len() - 4 ..].try_into().unwrap());
        assert_eq!(isize as usize, data.len());

        let restored = codec.decompress(&member, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_empty_block_is_a_valid_member() {
        let codec = GzipCodec::default();
        let member = codec.compress(&[]).unwrap();
        assert_eq!(&member[.. 3], &GZIP_MAGIC);
        assert!(codec.decompress(&member, 0).unwrap().is_empty());
    }

    #[test]
    fn test_decompress_rejects_length_mismatch() {
        let codec = GzipCodec::default();
        let member = codec.compress(b"abcdef").unwrap();
        assert!(codec.decompress(&member, 5).is_err());
        assert!(codec.decompress(&member, 7).is_err());
    }

    #[test]
    fn test_decompress_rejects_concatenated_members() {
        let codec = GzipCodec::default();
        let mut two = codec.compress(b"first").unwrap();
        two.extend(codec.compress(b"second").unwrap());
        assert!(codec.decompress(&two, 5).is_err());
    }

    #[test]
    fn test_decompress_rejects_corrupted_payload() {
        let codec = GzipCodec::new(9);
        let data = b"corruption is detected by the crc32 trailer".repeat(4);
        let mut member = codec.compress(&data).unwrap();
        let crc_pos = member.len() - 8;
        member[crc_pos] ^= 0xff;
        assert!(codec.decompress(&member, data.len()).is_err());
    }
}

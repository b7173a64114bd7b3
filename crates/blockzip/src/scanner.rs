//! Decompress path: recover block boundaries from a concatenated multi-member archive.
//!
//! There is no side-channel index. The scanner slides a window of `block_size + SCAN_MARGIN`
//! bytes over the archive and confirms a member boundary where two conditions hold:
//!
//! - the gzip magic triplet `1f 8b 08` starts at the position
//! - the four bytes right before it, read as the ISIZE trailer of the preceding member, equal
//!   the block size exactly
//!
//! Magic bytes also occur by chance inside deflate data; such a false positive would also have
//! to be preceded by a little-endian block size, which is rare but not impossible. Boundaries
//! closer than a minimal member to the pending block start are never considered.
//!
//! When a window ends without a boundary, the unconsumed tail is re-read as the head of the
//! next window by seeking the input back, and scanning resumes at the first position that was
//! not yet examined.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, info, trace};

use crate::{
    constants::{GZIP_MAGIC, MIN_MEMBER_LEN},
    io::read_full,
    member::{is_member_start, isize_before, validate_archive},
    pipeline::{BlockPipeline, RunSummary},
    pool::Task,
    writer::OutputWriter,
    BlockzipError,
    Result,
};

/// Scan state carried across window refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    /// Window position where scanning resumes
    pub offset:         usize,
    /// Start of the next unassigned block within the current window
    pub block_position: usize,
    /// Blocks filled in the current generation
    pub block_counter:  usize,
}

impl Default for ScanCursor {
    fn default() -> Self {
        Self {
            // The first member's own header is not a boundary.
            offset:         GZIP_MAGIC.len(),
            block_position: 0,
            block_counter:  0,
        }
    }
}

/// Find the next confirmed member boundary at or after `from`.
///
/// `block_start` is where the pending block begins; `block_size` is the ISIZE every non-final
/// member of the archive carries.
pub fn find_boundary(window: &[u8], from: usize, block_start: usize, block_size: u32) -> Option<usize> {
    let first = from.max(block_start + MIN_MEMBER_LEN);
    let last = window.len().checked_sub(GZIP_MAGIC.len())?;
    (first ..= last).find(|&pos| is_member_start(window, pos) && isize_before(window, pos) == Some(block_size))
}

impl BlockPipeline {
    /// Decompress a blockzip archive from `input` into `output`.
    ///
    /// The archive must start with the gzip magic triplet; this is checked before any block
    /// is scheduled. Up to `workers` members are decompressed per generation and written in
    /// archive order.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::InvalidFormat` - If the input is not a gzip archive, is truncated, or
    ///   contains a member that does not fit a scan window
    /// * `BlockzipError::BlockCodecFailure` - In strict mode, if a block fails to decompress
    /// * `BlockzipError::Io` - If reading, seeking or writing fails
    pub fn decompress<R: Read + Seek, W: Write>(&mut self, mut input: R, output: W) -> Result<RunSummary> {
        validate_archive(&mut input)?;

        let block_size = self.config.block_size;
        // Checked by PipelineConfig::validate.
        let expected_isize = u32::try_from(block_size).map_err(|_| {
            BlockzipError::ConfigError {
                message: format!("block size {} does not fit the gzip ISIZE field", block_size),
            }
        })?;
        let pool_size = self.pool.size();
        let mut window = vec![0_u8; self.config.scan_window_len()];
        let mut writer = OutputWriter::new(output);
        let mut summary = RunSummary::default();
        let mut cursor = ScanCursor::default();

        info!(
            "Decompressing with a {} byte scan window and {} workers",
            window.len(),
            pool_size
        );

        self.barrier.reset(pool_size);
        loop {
            let bytes_read = match read_full(&mut input, &mut window) {
                Ok(read) => read,
                Err(e) => {
                    self.abandon(cursor.block_counter);
                    return Err(e.into());
                }
            };
            let filled = &window[.. bytes_read];
            cursor.block_position = 0;
            trace!("Scan window of {} bytes, resuming at {}", bytes_read, cursor.offset);

            let mut search_pos = cursor.offset;
            while let Some(boundary) = find_boundary(filled, search_pos, cursor.block_position, expected_isize) {
                let member = filled[cursor.block_position .. boundary].to_vec();
                trace!(
                    "Boundary at window offset {}, block {} is {} bytes",
                    boundary,
                    cursor.block_counter,
                    member.len()
                );
                summary.bytes_in += member.len() as u64;
                cursor.block_position = boundary;
                search_pos = boundary + 1;

                self.submit(
                    Task::decompress(cursor.block_counter, member, block_size),
                    cursor.block_counter,
                )?;
                cursor.block_counter += 1;

                if cursor.block_counter == pool_size {
                    self.commit(&mut writer, pool_size, &mut summary)?;
                    cursor.block_counter = 0;
                    self.barrier.reset(pool_size);
                }
            }

            if bytes_read < window.len() {
                self.schedule_final_block(filled, &cursor, &mut summary)?;
                self.commit(&mut writer, cursor.block_counter + 1, &mut summary)?;
                break;
            }

            if cursor.block_position == 0 {
                self.abandon(cursor.block_counter);
                return Err(BlockzipError::invalid_format(format!(
                    "no block boundary within {} bytes, the archive was not written with a block size of {}",
                    window.len(),
                    block_size
                )));
            }

            // Positions up to `bytes_read - 3` have been examined.
            let examined_to = bytes_read - (GZIP_MAGIC.len() - 1);
            cursor.offset = examined_to.max(search_pos) - cursor.block_position;

            let unconsumed = bytes_read - cursor.block_position;
            if let Err(e) = input.seek(SeekFrom::Current(-(unconsumed as i64))) {
                self.abandon(cursor.block_counter);
                return Err(e.into());
            }
        }

        writer.finish()?;
        info!(
            "Decompressed {} bytes into {} bytes ({} blocks)",
            summary.bytes_in, summary.bytes_out, summary.blocks
        );
        Ok(summary)
    }

    /// Schedule the remainder of the last window as the final, possibly shorter, block.
    fn schedule_final_block(&self, filled: &[u8], cursor: &ScanCursor, summary: &mut RunSummary) -> Result<()> {
        let member = &filled[cursor.block_position ..];
        if member.len() < MIN_MEMBER_LEN {
            self.abandon(cursor.block_counter);
            return Err(BlockzipError::invalid_format(format!(
                "final member is truncated to {} bytes",
                member.len()
            )));
        }

        // The final member carries its own length, it may be shorter than a block.
        let expected_len = isize_before(filled, filled.len()).map_or(0, |size| size as usize);
        if expected_len > self.config.block_size {
            self.abandon(cursor.block_counter);
            return Err(BlockzipError::invalid_format(format!(
                "final member claims {} bytes, more than the block size {}",
                expected_len, self.config.block_size
            )));
        }

        debug!(
            "Final block {} is {} bytes, expands to {} bytes",
            cursor.block_counter,
            member.len(),
            expected_len
        );
        summary.bytes_in += member.len() as u64;
        self.barrier.set_target(cursor.block_counter + 1);
        self.submit(
            Task::decompress(cursor.block_counter, member.to_vec(), expected_len),
            cursor.block_counter,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::{rngs::StdRng, RngCore as _, SeedableRng as _};

    use super::*;
    use crate::{codec::BlockCodec, BlockFailureMode, GzipCodec, PipelineConfig};

    fn pipeline(workers: usize, block_size: usize, failure_mode: BlockFailureMode) -> BlockPipeline {
        BlockPipeline::new(PipelineConfig {
            workers,
            block_size,
            failure_mode,
            ..Default::default()
        })
        .unwrap()
    }

    fn archive_of(data: &[u8], block_size: usize) -> Vec<u8> {
        let codec = GzipCodec::default();
        let mut archive = Vec::new();
        for chunk in data.chunks(block_size) {
            archive.extend(codec.compress(chunk).unwrap());
        }
        archive
    }

    #[test]
    fn test_find_boundary_requires_matching_isize() {
        // 20 bytes of filler, a fake trailer claiming 64 bytes, then a magic triplet.
        let mut window = vec![0xaa_u8; 20];
        window.extend(64_u32.to_le_bytes());
        window.extend(GZIP_MAGIC);
        window.extend([0_u8; 8]);

        assert_eq!(find_boundary(&window, 3, 0, 64), Some(24));
        assert_eq!(find_boundary(&window, 3, 0, 65), None);
        assert_eq!(find_boundary(&window, 25, 0, 64), None);
    }

    #[test]
    fn test_find_boundary_ignores_magic_without_block_size_trailer() {
        let mut window = vec![0x11_u8; 30];
        // Magic preceded by an ISIZE that is not the block size.
        window.extend(GZIP_MAGIC);
        window.extend([0x22_u8; 10]);
        assert_eq!(find_boundary(&window, 3, 0, 1024), None);
    }

    #[test]
    fn test_find_boundary_respects_minimal_member_span() {
        let mut window = 64_u32.to_le_bytes().to_vec();
        window.extend(GZIP_MAGIC);
        window.extend([0_u8; 20]);
        // Position 4 is closer than a minimal member to the block start.
        assert_eq!(find_boundary(&window, 3, 0, 64), None);
    }

    #[test]
    fn test_scanner_splits_archive_written_elsewhere() {
        let data: Vec<u8> = (0 .. 1000_u32).map(|i| (i * 31 % 251) as u8).collect();
        let archive = archive_of(&data, 128);

        let mut pipeline = pipeline(3, 128, BlockFailureMode::Strict);
        let mut restored = Vec::new();
        let summary = pipeline.decompress(Cursor::new(&archive), &mut restored).unwrap();

        assert_eq!(restored, data);
        assert_eq!(summary.blocks, 8);
        assert_eq!(summary.generations, 3);
        assert_eq!(summary.bytes_in, archive.len() as u64);
    }

    #[test]
    fn test_rejects_non_gzip_input() {
        let mut pipeline = pipeline(2, 128, BlockFailureMode::Warn);
        let result = pipeline.decompress(Cursor::new(b"plain text".to_vec()), Vec::new());
        assert!(matches!(result, Err(BlockzipError::InvalidFormat { .. })));

        let result = pipeline.decompress(Cursor::new(Vec::new()), Vec::new());
        assert!(matches!(result, Err(BlockzipError::InvalidFormat { .. })));
    }

    #[test]
    fn test_trailing_garbage_fails_final_block() {
        let mut archive = archive_of(&[5_u8; 200], 128);
        // A stray header whose last four bytes read as ISIZE 10. It is not preceded by ISIZE
        // 128 (the second member holds 72 bytes), so it is glued to the final block.
        archive.extend([0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00]);

        let mut pipeline = pipeline(2, 128, BlockFailureMode::Strict);
        let result = pipeline.decompress(Cursor::new(&archive), Vec::new());
        assert!(matches!(result, Err(BlockzipError::BlockCodecFailure { index: 1, .. })));
    }

    #[test]
    fn test_final_member_larger_than_block_is_rejected() {
        let archive = GzipCodec::default().compress(&[1_u8; 300]).unwrap();
        let mut pipeline = pipeline(2, 128, BlockFailureMode::Warn);
        let result = pipeline.decompress(Cursor::new(&archive), Vec::new());
        assert!(matches!(result, Err(BlockzipError::InvalidFormat { .. })));
    }

    #[test]
    fn test_rejects_archive_cut_right_after_a_boundary() {
        let mut archive = archive_of(&[9_u8; 256], 128);
        let second_start = {
            let codec = GzipCodec::default();
            codec.compress(&[9_u8; 128]).unwrap().len()
        };
        archive.truncate(second_start + 6);

        let mut pipeline = pipeline(2, 128, BlockFailureMode::Warn);
        let result = pipeline.decompress(Cursor::new(&archive), Vec::new());
        assert!(matches!(result, Err(BlockzipError::InvalidFormat { .. })));
    }

    #[test]
    fn test_window_refill_keeps_unconsumed_tail() {
        // Incompressible blocks make every member longer than a block, forcing refills.
        let mut data = vec![0_u8; 64 * 1024];
        StdRng::seed_from_u64(7).fill_bytes(&mut data);
        let archive = archive_of(&data, 4096);

        let mut pipeline = pipeline(4, 4096, BlockFailureMode::Strict);
        let mut restored = Vec::new();
        let summary = pipeline.decompress(Cursor::new(&archive), &mut restored).unwrap();
        assert_eq!(summary.blocks, 16);
        assert_eq!(restored, data);
    }
}

//! Byte-level helpers for gzip member framing.

use std::io::{Read, Seek, SeekFrom};

use crate::{
    constants::{GZIP_MAGIC, ISIZE_LEN},
    BlockzipError,
    Result,
};

/// Whether the magic triplet starts at `pos`.
pub fn is_member_start(buf: &[u8], pos: usize) -> bool {
    buf.get(pos .. pos + GZIP_MAGIC.len()) == Some(&GZIP_MAGIC[..])
}

/// Little-endian ISIZE field of the member ending right before `end`.
///
/// Returns `None` when fewer than four bytes precede `end`.
pub fn isize_before(buf: &[u8], end: usize) -> Option<u32> {
    let start = end.checked_sub(ISIZE_LEN)?;
    let field: [u8; ISIZE_LEN] = buf.get(start .. end)?.try_into().ok()?;
    Some(u32::from_le_bytes(field))
}

/// Check that the stream starts with the gzip magic triplet, then rewind it.
///
/// # Errors
///
/// * `BlockzipError::InvalidFormat` - If the stream is shorter than the triplet or starts with
///   other bytes
/// * `BlockzipError::Io` - If reading or seeking fails
pub fn validate_archive<R: Read + Seek>(input: &mut R) -> Result<()> {
    let start = input.stream_position()?;
    let mut header = [0_u8; GZIP_MAGIC.len()];
    let read = crate::io::read_full(input, &mut header)?;
    input.seek(SeekFrom::Start(start))?;

    if read < header.len() {
        return Err(BlockzipError::invalid_format(format!(
            "archive is only {} bytes long",
            read
        )));
    }
    if header != GZIP_MAGIC {
        return Err(BlockzipError::invalid_format(format!(
            "missing gzip magic, found {:02x} {:02x} {:02x}",
            header[0], header[1], header[2]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_is_member_start() {
        let buf = [0x00, 0x1f, 0x8b, 0x08, 0x00];
        assert!(!is_member_start(&buf, 0));
        assert!(is_member_start(&buf, 1));
        assert!(!is_member_start(&buf, 3));
        assert!(!is_member_start(&buf, 10));
    }

    #[test]
    fn test_isize_before() {
        let buf = [0x00, 0x00, 0x10, 0x00, 0x1f];
        assert_eq!(isize_before(&buf, 4), Some(0x0010_0000));
        assert_eq!(isize_before(&buf, 3), None);
        assert_eq!(isize_before(&buf, 9), None);
    }

    #[test]
    fn test_validate_archive_rewinds() {
        let mut input = Cursor::new(vec![0x1f, 0x8b, 0x08, 0x00, 0x01]);
        validate_archive(&mut input).unwrap();
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn test_validate_archive_rejects_other_formats() {
        let mut input = Cursor::new(b"PK\x03\x04".to_vec());
        assert!(matches!(
            validate_archive(&mut input),
            Err(BlockzipError::InvalidFormat { .. })
        ));

        let mut short = Cursor::new(vec![0x1f, 0x8b]);
        assert!(matches!(
            validate_archive(&mut short),
            Err(BlockzipError::InvalidFormat { .. })
        ));

        let mut empty = Cursor::new(Vec::new());
        assert!(validate_archive(&mut empty).is_err());
    }
}

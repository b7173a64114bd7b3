//! Stream helpers shared by the scheduler and the scanner.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
///
/// Unlike a single `read` call, a short count here always means end of stream.
pub fn read_full<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled ..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Bytes left between the current position and the end of the stream.
pub fn remaining_len<S: Seek + ?Sized>(input: &mut S) -> io::Result<u64> {
    let position = input.stream_position()?;
    let end = input.seek(SeekFrom::End(0))?;
    if end != position {
        input.seek(SeekFrom::Start(position))?;
    }
    Ok(end.saturating_sub(position))
}

//! Byte source reader: fill a caller-owned buffer from any `Read`, retrying on interruption.

use std::io::{self, ErrorKind, Read};

/// Default read buffer capacity in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Outcome of one read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Filled(usize),
    EndOfStream,
}

/// Read once from `source` into `buf`. `Interrupted` is retried in place; a zero-length read
/// is end of stream. Short reads are normal.
pub fn read_chunk<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    loop {
        match source.read(buf) {
            Ok(0) => return Ok(ReadOutcome::EndOfStream),
            Ok(n) => return Ok(ReadOutcome::Filled(n)),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Fixed-capacity read buffer, reused across reads. Each fill replaces the previous content.
pub struct ReadBuffer {
    data: Box<[u8]>,
    filled: usize,
    /// Stream offset of `data[0]`.
    offset: u64,
    /// Stream offset just past the filled bytes.
    next_offset: u64,
    reads: u64,
}

impl ReadBuffer {
    /// Capacity 0 falls back to [`DEFAULT_READ_BUFFER_SIZE`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_READ_BUFFER_SIZE
        } else {
            capacity
        };
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            filled: 0,
            offset: 0,
            next_offset: 0,
            reads: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Read the next chunk from `source`, replacing the current content.
    pub fn fill_from<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<ReadOutcome> {
        let outcome = read_chunk(source, &mut self.data)?;
        self.offset = self.next_offset;
        match outcome {
            ReadOutcome::Filled(n) => {
                self.filled = n;
                self.next_offset += n as u64;
                self.reads += 1;
            }
            ReadOutcome::EndOfStream => self.filled = 0,
        }
        Ok(outcome)
    }

    /// Bytes from the last successful fill.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Stream offset of the first filled byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total bytes read so far.
    pub fn total_read(&self) -> u64 {
        self.next_offset
    }

    /// Number of non-empty reads performed.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_SIZE)
    }
}

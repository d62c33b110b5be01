//! Run options shared by the library and the binary.

use std::path::PathBuf;

use crate::reader::DEFAULT_READ_BUFFER_SIZE;
use crate::window::DEFAULT_WINDOW_SIZE;

/// Options for one replay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Read buffer capacity (default 1 MiB).
    pub read_buffer_size: usize,
    /// Maximum bytes per feed call (default 1 KiB).
    pub window_size: usize,
    /// Ordinal to dump; 0 means none.
    pub dump: u64,
    /// Directory dump files are written to (default current directory).
    pub dump_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            dump: 0,
            dump_dir: PathBuf::from("."),
        }
    }
}

impl RunOptions {
    pub fn with_sizes(read_buffer_size: usize, window_size: usize) -> Self {
        Self {
            read_buffer_size,
            window_size,
            ..Self::default()
        }
    }
}

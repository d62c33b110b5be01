//! Chunk slicer: split a filled read buffer into bounded windows to emulate piecemeal delivery.

/// Default window size in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 1024; // 1 KiB

/// A bounded view into the read buffer. `start` is relative to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub start: usize,
    pub bytes: &'a [u8],
}

fn effective_size(window_size: usize) -> usize {
    if window_size == 0 {
        DEFAULT_WINDOW_SIZE
    } else {
        window_size
    }
}

/// Iterator over the windows of a buffer.
pub struct Windows<'a> {
    buf: &'a [u8],
    size: usize,
    pos: usize,
}

impl<'a> Windows<'a> {
    pub fn new(buf: &'a [u8], window_size: usize) -> Self {
        Self {
            buf,
            size: effective_size(window_size),
            pos: 0,
        }
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let start = self.pos;
        let end = (start + self.size).min(self.buf.len());
        self.pos = end;
        Some(Window {
            start,
            bytes: &self.buf[start..end],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.buf.len() - self.pos).div_ceil(self.size);
        (n, Some(n))
    }
}

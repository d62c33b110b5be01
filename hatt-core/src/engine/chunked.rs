//! Incremental decoder for `Transfer-Encoding: chunked` bodies.

const MAX_LINE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(u64),
    DataCr,
    DataLf,
    Trailer,
    Done,
}

/// Receives decoded chunk data.
pub trait BodySink {
    fn push(&mut self, data: &[u8]);
}

impl BodySink for Vec<u8> {
    fn push(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: State,
    line: Vec<u8>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Size,
            line: Vec::new(),
        }
    }

    /// True once the last chunk and the trailer section have been read.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Decode from `input`, stopping at the end of the body. Returns the bytes taken.
    pub fn push<S: BodySink + ?Sized>(
        &mut self,
        input: &[u8],
        sink: &mut S,
    ) -> Result<usize, String> {
        let mut i = 0usize;
        while i < input.len() {
            match self.state {
                State::Size => {
                    let b = input[i];
                    i += 1;
                    self.push_line_byte(b)?;
                    if b == b'\n' {
                        let size = parse_chunk_size(&self.line)?;
                        self.line.clear();
                        self.state = if size == 0 {
                            State::Trailer
                        } else {
                            State::Data(size)
                        };
                    }
                }
                State::Data(remaining) => {
                    let take = remaining.min((input.len() - i) as u64) as usize;
                    sink.push(&input[i..i + take]);
                    i += take;
                    let left = remaining - take as u64;
                    self.state = if left == 0 {
                        State::DataCr
                    } else {
                        State::Data(left)
                    };
                }
                State::DataCr => {
                    let b = input[i];
                    i += 1;
                    self.state = match b {
                        b'\r' => State::DataLf,
                        b'\n' => State::Size,
                        _ => return Err("missing CRLF after chunk data".into()),
                    };
                }
                State::DataLf => {
                    if input[i] != b'\n' {
                        return Err("missing CRLF after chunk data".into());
                    }
                    i += 1;
                    self.state = State::Size;
                }
                State::Trailer => {
                    let b = input[i];
                    i += 1;
                    if b == b'\n' {
                        let end = self.line.is_empty() || self.line == b"\r";
                        self.line.clear();
                        if end {
                            self.state = State::Done;
                        }
                    } else {
                        self.push_line_byte(b)?;
                    }
                }
                State::Done => break,
            }
        }
        Ok(i)
    }

    fn push_line_byte(&mut self, b: u8) -> Result<(), String> {
        if self.line.len() >= MAX_LINE {
            return Err("chunk line too long".into());
        }
        self.line.push(b);
        Ok(())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Size line including its CRLF. Extensions are ignored.
fn parse_chunk_size(line: &[u8]) -> Result<u64, String> {
    if line == b"\r\n" {
        return Err("empty chunk size".into());
    }
    match httparse::parse_chunk_size(line) {
        Ok(httparse::Status::Complete((n, size))) if n == line.len() => Ok(size),
        _ => Err(format!(
            "invalid chunk size line: {}",
            String::from_utf8_lossy(line).trim_end()
        )),
    }
}

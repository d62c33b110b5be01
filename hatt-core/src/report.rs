//! Result reporting: observer hooks called by the multiplexer, and the console status printer.

use std::io::Write;
use std::path::Path;

use crate::classifier::Decision;

/// One feed call as seen by a reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedEvent {
    pub ordinal: u64,
    /// Absolute stream offset of the first byte fed.
    pub stream_offset: u64,
    pub len: usize,
    pub decision: Decision,
}

/// Observer of a run. Every hook defaults to a no-op; nothing a reporter does changes control flow.
pub trait Reporter {
    /// A new chunk was read. `ordinal` is the live request at the time of the read.
    fn on_read(&mut self, _ordinal: u64, _stream_offset: u64, _len: usize) {}

    fn on_feed(&mut self, _event: &FeedEvent) {}

    /// Request `ordinal` completed; `window_offset` is where the next request starts in the
    /// window and `residual` how many window bytes are left for it.
    fn on_complete(&mut self, _ordinal: u64, _window_offset: usize, _residual: usize) {}

    fn on_dump(&mut self, _ordinal: u64, _path: &Path) {}

    fn on_dump_error(&mut self, _ordinal: u64, _message: &str) {}

    /// Classifier error on `ordinal`.
    fn on_error(&mut self, _ordinal: u64, _message: &str) {}
}

/// Reporter that prints nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Reporter for Silent {}

/// Human-readable status lines. Deny, error and dump lines are always printed; the rest only
/// when verbose.
pub struct ConsoleReporter<W: Write> {
    out: W,
    verbose: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Write failures on the status stream are ignored.
impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_read(&mut self, ordinal: u64, stream_offset: u64, len: usize) {
        if self.verbose {
            let _ = writeln!(
                self.out,
                ">> Read new chunk: req: {} off: {} size: {}",
                ordinal, stream_offset, len
            );
        }
    }

    fn on_feed(&mut self, ev: &FeedEvent) {
        if self.verbose {
            let _ = write!(
                self.out,
                "---- Check: req: {} off: {} size {} ",
                ev.ordinal, ev.stream_offset, ev.len
            );
        }
        match ev.decision {
            Decision::Accept(point) => {
                if self.verbose {
                    let _ = writeln!(self.out, "[OK: point: {}]", point);
                }
            }
            Decision::Pending => {
                if self.verbose {
                    let _ = writeln!(self.out, "[PENDING]");
                }
            }
            Decision::Deny(point) => {
                let _ = writeln!(self.out, "[DENY: r: {} point: {}]", ev.ordinal, point);
            }
            // Printed by on_error, which carries the engine message.
            Decision::Error => {}
        }
    }

    fn on_complete(&mut self, ordinal: u64, window_offset: usize, residual: usize) {
        if self.verbose {
            let _ = writeln!(
                self.out,
                "---- Completed req: {} chunk off: {} len: {}",
                ordinal, window_offset, residual
            );
        }
    }

    fn on_dump(&mut self, _ordinal: u64, path: &Path) {
        let name = path.file_name().unwrap_or(path.as_os_str());
        let _ = writeln!(self.out, "---- Dump: {}", name.to_string_lossy());
    }

    fn on_dump_error(&mut self, _ordinal: u64, message: &str) {
        let _ = writeln!(self.out, "---- Dump request error: {}", message);
    }

    fn on_error(&mut self, ordinal: u64, message: &str) {
        let _ = writeln!(self.out, "[ERROR: r: {} {}]", ordinal, message);
    }
}

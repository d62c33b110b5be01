//! Request multiplexer: drives one classifier at a time across windows of the byte stream.
//!
//! Window boundaries and request boundaries are independent. When a request completes in the
//! middle of a window, the tail of that same window is fed to the next request before any new
//! window is taken, so several requests may complete inside one window.

use std::io::Read;
use std::path::PathBuf;

use tracing::{debug, info, trace, warn};

use crate::classifier::{Classifier, Engine, EngineError};
use crate::config::RunOptions;
use crate::dump::{DumpError, DumpWriter};
use crate::reader::{ReadBuffer, ReadOutcome};
use crate::report::{FeedEvent, Reporter};
use crate::window::Windows;

/// Fatal run failure. Every variant ends the run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request {ordinal}: {source}")]
    Allocation { ordinal: u64, source: EngineError },
    #[error("request {ordinal}: classifier error: {message}")]
    Classifier { ordinal: u64, message: String },
    #[error("request {ordinal}: classifier consumed {consumed} of {remaining} bytes")]
    ConsumedOutOfRange {
        ordinal: u64,
        consumed: usize,
        remaining: usize,
    },
    #[error("request {ordinal}: dump failed: {source}")]
    Dump { ordinal: u64, source: DumpError },
    #[error("multiplexer closed after a fatal error")]
    Closed,
}

impl RunError {
    /// Ordinal of the request the failure belongs to, if any.
    pub fn ordinal(&self) -> Option<u64> {
        match self {
            RunError::Allocation { ordinal, .. }
            | RunError::Classifier { ordinal, .. }
            | RunError::ConsumedOutOfRange { ordinal, .. }
            | RunError::Dump { ordinal, .. } => Some(*ordinal),
            RunError::Io(_) | RunError::Closed => None,
        }
    }
}

/// Totals for a run that reached end of stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reads: u64,
    pub bytes: u64,
    pub feeds: u64,
    pub completed: u64,
    /// Bytes fed to the final request, which never completed.
    pub trailing_bytes: u64,
    pub dump: Option<PathBuf>,
}

/// Holds the single live request and its ordinal.
pub struct Multiplexer<'e, E: Engine> {
    engine: &'e E,
    /// `None` only after a fatal error or once finished.
    current: Option<E::Request>,
    ordinal: u64,
    dump: DumpWriter,
    dumped: Option<PathBuf>,
    feeds: u64,
    completed: u64,
    /// Bytes fed to `current` so far.
    request_bytes: u64,
}

impl<'e, E: Engine> Multiplexer<'e, E> {
    /// Create the multiplexer and request 1.
    pub fn new(engine: &'e E, dump: DumpWriter) -> Result<Self, RunError> {
        let first = engine
            .new_request()
            .map_err(|source| RunError::Allocation { ordinal: 1, source })?;
        Ok(Self {
            engine,
            current: Some(first),
            ordinal: 1,
            dump,
            dumped: None,
            feeds: 0,
            completed: 0,
            request_bytes: 0,
        })
    }

    /// Ordinal of the live request.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Feed one window. `stream_offset` is the absolute offset of `window[0]`.
    pub fn feed_window<P: Reporter + ?Sized>(
        &mut self,
        window: &[u8],
        stream_offset: u64,
        reporter: &mut P,
    ) -> Result<(), RunError> {
        let mut offset = 0usize;
        while offset < window.len() {
            let remaining = window.len() - offset;
            let ordinal = self.ordinal;
            let request = self.current.as_mut().ok_or(RunError::Closed)?;

            let decision = request.feed(&window[offset..]);
            self.feeds += 1;
            let event = FeedEvent {
                ordinal,
                stream_offset: stream_offset + offset as u64,
                len: remaining,
                decision,
            };
            trace!(
                req = ordinal,
                off = event.stream_offset,
                len = remaining,
                ?decision,
                "feed"
            );
            reporter.on_feed(&event);

            if decision.is_error() {
                let message = request
                    .last_error()
                    .unwrap_or("unknown classifier error")
                    .to_string();
                reporter.on_error(ordinal, &message);
                self.current = None;
                return Err(RunError::Classifier { ordinal, message });
            }

            if !request.is_completed() {
                self.request_bytes += remaining as u64;
                break;
            }

            let consumed = request.consumed();
            if consumed == 0 || consumed > remaining {
                self.current = None;
                return Err(RunError::ConsumedOutOfRange {
                    ordinal,
                    consumed,
                    remaining,
                });
            }
            offset += consumed;
            self.request_bytes += consumed as u64;
            self.retire(offset, window.len() - offset, reporter)?;
        }
        Ok(())
    }

    /// Completion of the live request: dump if asked, release, then create the next one.
    fn retire<P: Reporter + ?Sized>(
        &mut self,
        window_offset: usize,
        residual: usize,
        reporter: &mut P,
    ) -> Result<(), RunError> {
        let ordinal = self.ordinal;
        self.completed += 1;
        debug!(
            req = ordinal,
            bytes = self.request_bytes,
            residual,
            "request completed"
        );
        reporter.on_complete(ordinal, window_offset, residual);

        if self.dump.wants(ordinal) {
            let request = self.current.as_ref().ok_or(RunError::Closed)?;
            match self.dump.write(request, ordinal) {
                Ok(path) => {
                    info!(req = ordinal, path = %path.display(), "request dumped");
                    reporter.on_dump(ordinal, &path);
                    self.dumped = Some(path);
                }
                Err(source) => {
                    let message = request
                        .last_error()
                        .map(str::to_string)
                        .unwrap_or_else(|| source.to_string());
                    reporter.on_dump_error(ordinal, &message);
                    self.current = None;
                    return Err(RunError::Dump { ordinal, source });
                }
            }
        }

        self.current = None;
        self.request_bytes = 0;
        self.ordinal += 1;
        let next = self
            .engine
            .new_request()
            .map_err(|source| RunError::Allocation {
                ordinal: self.ordinal,
                source,
            })?;
        self.current = Some(next);
        Ok(())
    }

    /// Release the live request at end of stream. An incomplete trailing request is not an error.
    pub fn finish(mut self, buffer: &ReadBuffer) -> RunSummary {
        if self.request_bytes > 0 {
            warn!(
                req = self.ordinal,
                bytes = self.request_bytes,
                "stream ended inside an incomplete request"
            );
        }
        self.current = None;
        RunSummary {
            reads: buffer.reads(),
            bytes: buffer.total_read(),
            feeds: self.feeds,
            completed: self.completed,
            trailing_bytes: self.request_bytes,
            dump: self.dumped.take(),
        }
    }
}

/// Replay `source` through `engine` using a caller-owned buffer.
pub fn run<R, E, P>(
    source: &mut R,
    buffer: &mut ReadBuffer,
    engine: &E,
    options: &RunOptions,
    reporter: &mut P,
) -> Result<RunSummary, RunError>
where
    R: Read + ?Sized,
    E: Engine,
    P: Reporter + ?Sized,
{
    let dump = DumpWriter::new(options.dump_dir.clone(), options.dump);
    let mut mux = Multiplexer::new(engine, dump)?;
    loop {
        match buffer.fill_from(source)? {
            ReadOutcome::EndOfStream => break,
            ReadOutcome::Filled(n) => {
                debug!(req = mux.ordinal(), off = buffer.offset(), size = n, "read chunk");
                reporter.on_read(mux.ordinal(), buffer.offset(), n);
            }
        }
        let base = buffer.offset();
        for window in Windows::new(buffer.filled(), options.window_size) {
            mux.feed_window(window.bytes, base + window.start as u64, reporter)?;
        }
    }
    Ok(mux.finish(buffer))
}

/// Like [`run`], allocating a buffer of `options.read_buffer_size`.
pub fn replay<R, E, P>(
    source: &mut R,
    engine: &E,
    options: &RunOptions,
    reporter: &mut P,
) -> Result<RunSummary, RunError>
where
    R: Read + ?Sized,
    E: Engine,
    P: Reporter + ?Sized,
{
    let mut buffer = ReadBuffer::with_capacity(options.read_buffer_size);
    run(source, &mut buffer, engine, options, reporter)
}

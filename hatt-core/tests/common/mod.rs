#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use hatt_core::{
    Classifier, Decision, Engine, EngineError, FeedEvent, Reporter, RuleEngine, RuleSet,
    SerializeError,
};

pub const GET: &[u8] = b"GET / HTTP/1.1\r\n\r\n";

pub fn rule_engine(toml: &str) -> RuleEngine {
    RuleEngine::new(RuleSet::from_toml(toml).unwrap())
}

/// A mixed stream: plain GETs, a Content-Length body, a chunked body, a denied path.
pub fn sample_requests() -> Vec<Vec<u8>> {
    vec![
        GET.to_vec(),
        b"POST /submit HTTP/1.1\r\nHost: example.com\r\n\
          Content-Length: 11\r\n\r\nhello world"
            .to_vec(),
        b"GET /admin/panel HTTP/1.0\r\nUser-Agent: curl\r\n\r\n".to_vec(),
        b"PUT /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
          5\r\nhello\r\n6;x=y\r\n world\r\n0\r\nX-Sum: 1\r\n\r\n"
            .to_vec(),
        GET.to_vec(),
    ]
}

pub const SAMPLE_RULES: &str = r#"
default_action = "accept"

[[rule]]
id = 1
action = "deny"
[[rule.condition]]
field = "path"
op = "prefix"
value = "/admin"

[[rule]]
id = 2
action = "deny"
match = "any"
[[rule.condition]]
field = "method"
op = "equals"
value = "TRACE"
[[rule.condition]]
field = "body"
op = "contains"
value = "world"
"#;

/// Wraps an engine and records, per request, exactly the bytes it took.
pub struct Recording<E> {
    pub inner: E,
    pub taken: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl<E> Recording<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            taken: Rc::default(),
        }
    }

    pub fn taken(&self) -> Vec<Vec<u8>> {
        self.taken.borrow().clone()
    }
}

pub struct RecordingRequest<C> {
    inner: C,
    index: usize,
    taken: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl<E: Engine> Engine for Recording<E> {
    type Request = RecordingRequest<E::Request>;

    fn new_request(&self) -> Result<Self::Request, EngineError> {
        let inner = self.inner.new_request()?;
        let mut taken = self.taken.borrow_mut();
        taken.push(Vec::new());
        Ok(RecordingRequest {
            inner,
            index: taken.len() - 1,
            taken: self.taken.clone(),
        })
    }
}

impl<C: Classifier> Classifier for RecordingRequest<C> {
    fn feed(&mut self, bytes: &[u8]) -> Decision {
        let decision = self.inner.feed(bytes);
        let n = if self.inner.is_completed() {
            self.inner.consumed()
        } else {
            bytes.len()
        };
        self.taken.borrow_mut()[self.index].extend_from_slice(&bytes[..n]);
        decision
    }
    fn is_completed(&self) -> bool {
        self.inner.is_completed()
    }
    fn consumed(&self) -> usize {
        self.inner.consumed()
    }
    fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        self.inner.serialize()
    }
    fn last_error(&self) -> Option<&str> {
        self.inner.last_error()
    }
}

/// Returns at most the next size from `sizes` (cycled) per read, optionally interrupting first.
pub struct ScriptedReader {
    data: Vec<u8>,
    pos: usize,
    sizes: Vec<usize>,
    call: usize,
    interrupt_every: Option<usize>,
    pub interrupts: usize,
}

impl ScriptedReader {
    pub fn new(data: Vec<u8>, sizes: Vec<usize>) -> Self {
        Self {
            data,
            pos: 0,
            sizes,
            call: 0,
            interrupt_every: None,
            interrupts: 0,
        }
    }

    /// Fail every `n`th call with `Interrupted`.
    pub fn interrupt_every(mut self, n: usize) -> Self {
        self.interrupt_every = Some(n);
        self
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.call += 1;
        if let Some(n) = self.interrupt_every {
            if self.call % n == 0 {
                self.interrupts += 1;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "simulated EINTR"));
            }
        }
        let size = if self.sizes.is_empty() {
            buf.len()
        } else {
            self.sizes[self.call % self.sizes.len()]
        };
        let n = size.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reporter that keeps every event.
#[derive(Debug, Default)]
pub struct Recorder {
    pub reads: Vec<(u64, u64, usize)>,
    pub feeds: Vec<FeedEvent>,
    pub completions: Vec<(u64, usize, usize)>,
    pub dumps: Vec<u64>,
    pub errors: Vec<(u64, String)>,
}

impl Recorder {
    /// Last decision reported for each ordinal, in ordinal order.
    pub fn final_decisions(&self) -> Vec<(u64, Decision)> {
        let mut out: Vec<(u64, Decision)> = Vec::new();
        for ev in &self.feeds {
            match out.last_mut() {
                Some((ordinal, d)) if *ordinal == ev.ordinal => *d = ev.decision,
                _ => out.push((ev.ordinal, ev.decision)),
            }
        }
        out
    }
}

impl Reporter for Recorder {
    fn on_read(&mut self, ordinal: u64, stream_offset: u64, len: usize) {
        self.reads.push((ordinal, stream_offset, len));
    }
    fn on_feed(&mut self, event: &FeedEvent) {
        self.feeds.push(*event);
    }
    fn on_complete(&mut self, ordinal: u64, window_offset: usize, residual: usize) {
        self.completions.push((ordinal, window_offset, residual));
    }
    fn on_dump(&mut self, ordinal: u64, _path: &std::path::Path) {
        self.dumps.push(ordinal);
    }
    fn on_error(&mut self, ordinal: u64, message: &str) {
        self.errors.push((ordinal, message.to_string()));
    }
}

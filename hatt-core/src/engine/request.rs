//! One HTTP/1.x request as seen by the rule engine: head via httparse, body by
//! Content-Length or chunked framing, verdict from the rule set.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::chunked::{BodySink, ChunkedDecoder};
use super::pack::{self, PackedHeader, PackedRequest, PackedVerdict};
use super::rules::{Action, RequestView, RuleSet};
use crate::classifier::{Classifier, Decision, MatchPoint, SerializeError};

const MAX_HEADERS: usize = 64;

struct Head {
    method: String,
    path: String,
    version: u8,
    headers: Vec<(String, Vec<u8>)>,
}

enum Framing {
    Length(u64),
    Chunked(ChunkedDecoder),
}

enum Phase {
    Head,
    Body(Framing),
    Done,
    Failed,
}

/// Decoded body: full length and digest, prefix retained up to `cap`.
struct Body {
    retained: Vec<u8>,
    len: u64,
    hasher: Sha256,
    cap: usize,
}

impl BodySink for Body {
    fn push(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
        let room = self.cap.saturating_sub(self.retained.len());
        self.retained
            .extend_from_slice(&data[..data.len().min(room)]);
    }
}

/// Request context handed out by [`super::RuleEngine`].
pub struct HttpRequest {
    rules: Arc<RuleSet>,
    phase: Phase,
    /// Head bytes seen so far; truncated to the head once it parses.
    head_buf: Vec<u8>,
    head: Option<Head>,
    chunked: bool,
    body: Body,
    wire_len: u64,
    consumed: usize,
    verdict: Option<(Action, MatchPoint)>,
    error: Option<String>,
}

impl HttpRequest {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        let cap = rules.max_body_bytes;
        Self {
            rules,
            phase: Phase::Head,
            head_buf: Vec::new(),
            head: None,
            chunked: false,
            body: Body {
                retained: Vec::new(),
                len: 0,
                hasher: Sha256::new(),
                cap,
            },
            wire_len: 0,
            consumed: 0,
            verdict: None,
            error: None,
        }
    }

    /// Request length on the wire so far.
    pub fn wire_len(&self) -> u64 {
        self.wire_len
    }

    fn decision(&self) -> Decision {
        if let Phase::Failed = self.phase {
            return Decision::Error;
        }
        match self.verdict {
            Some((Action::Accept, point)) => Decision::Accept(point),
            Some((Action::Deny, point)) => Decision::Deny(point),
            None => Decision::Pending,
        }
    }

    fn fail(&mut self, message: String) -> Decision {
        self.phase = Phase::Failed;
        self.error = Some(message);
        Decision::Error
    }

    /// Append `bytes` to the head. `Some(n)`: the head ended after `n` bytes of `bytes`.
    fn take_head(&mut self, bytes: &[u8]) -> Result<Option<usize>, String> {
        let before = self.head_buf.len();
        self.head_buf.extend_from_slice(bytes);
        let max = self.rules.max_header_bytes;

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        let status = req
            .parse(&self.head_buf)
            .map_err(|e| format!("malformed request head: {}", e))?;
        let n = match status {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => {
                if self.head_buf.len() > max {
                    return Err(format!("request head exceeds {} bytes", max));
                }
                return Ok(None);
            }
        };
        if n > max {
            return Err(format!("request head exceeds {} bytes", max));
        }
        let head = Head {
            method: req.method.unwrap_or_default().to_string(),
            path: req.path.unwrap_or_default().to_string(),
            version: req.version.unwrap_or(1),
            headers: req
                .headers
                .iter()
                .map(|h| (h.name.to_string(), h.value.to_vec()))
                .collect(),
        };
        self.head_buf.truncate(n);
        self.head = Some(head);
        Ok(Some(n - before))
    }

    fn update_verdict(&mut self) {
        if self.verdict.is_some() {
            return;
        }
        let Some(head) = &self.head else {
            return;
        };
        let view = RequestView {
            method: &head.method,
            path: &head.path,
            version: head.version,
            headers: &head.headers,
            body: &self.body.retained,
            body_complete: matches!(self.phase, Phase::Done),
        };
        self.verdict = self.rules.evaluate(&view);
    }

    fn packed(&self) -> Option<PackedRequest> {
        let head = self.head.as_ref()?;
        Some(PackedRequest {
            method: head.method.clone(),
            path: head.path.clone(),
            version: head.version,
            headers: head
                .headers
                .iter()
                .map(|(name, value)| PackedHeader {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            chunked: self.chunked,
            body: self.body.retained.clone(),
            body_len: self.body.len,
            body_sha256: self.body.hasher.clone().finalize().into(),
            wire_len: self.wire_len,
            verdict: self.verdict.map(|(action, point)| PackedVerdict {
                action,
                rule: point.rule,
                condition: point.condition,
            }),
        })
    }
}

/// Body framing from the parsed head. Chunked wins over Content-Length.
///
/// Transfer-Encoding headers are combined in order into one codings list; `chunked` must be
/// the last coding when present.
fn framing(head: &Head) -> Result<Framing, String> {
    let mut codings: Vec<String> = Vec::new();
    let mut length: Option<u64> = None;
    for (name, value) in &head.headers {
        if name.eq_ignore_ascii_case("Transfer-Encoding") {
            codings.extend(
                String::from_utf8_lossy(value)
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty()),
            );
        } else if name.eq_ignore_ascii_case("Content-Length") {
            let n = std::str::from_utf8(value)
                .ok()
                .map(str::trim)
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    format!("invalid Content-Length: {}", String::from_utf8_lossy(value))
                })?;
            if length.is_some_and(|l| l != n) {
                return Err("conflicting Content-Length headers".into());
            }
            length = Some(n);
        }
    }
    let chunked = codings.last().is_some_and(|c| c == "chunked");
    if !chunked && codings.iter().any(|c| c == "chunked") {
        return Err("chunked is not the final transfer coding".into());
    }
    if chunked {
        Ok(Framing::Chunked(ChunkedDecoder::new()))
    } else {
        Ok(Framing::Length(length.unwrap_or(0)))
    }
}

impl Classifier for HttpRequest {
    fn feed(&mut self, bytes: &[u8]) -> Decision {
        if matches!(self.phase, Phase::Done | Phase::Failed) || bytes.is_empty() {
            return self.decision();
        }

        let mut used = 0usize;
        if let Phase::Head = self.phase {
            match self.take_head(bytes) {
                Ok(None) => {
                    self.wire_len += bytes.len() as u64;
                    return self.decision();
                }
                Ok(Some(n)) => {
                    used = n;
                    let framing = match self.head.as_ref().map(framing) {
                        Some(Ok(f)) => f,
                        Some(Err(msg)) => return self.fail(msg),
                        None => return self.fail("request head missing".into()),
                    };
                    self.chunked = matches!(framing, Framing::Chunked(_));
                    self.phase = Phase::Body(framing);
                }
                Err(msg) => return self.fail(msg),
            }
        }

        let rest = &bytes[used..];
        let progress = match &mut self.phase {
            Phase::Body(Framing::Length(remaining)) => {
                let take = (*remaining).min(rest.len() as u64) as usize;
                self.body.push(&rest[..take]);
                *remaining -= take as u64;
                Ok((take, *remaining == 0))
            }
            Phase::Body(Framing::Chunked(decoder)) => decoder
                .push(rest, &mut self.body)
                .map(|n| (n, decoder.is_done())),
            Phase::Head | Phase::Done | Phase::Failed => Ok((0, false)),
        };
        let (taken, done) = match progress {
            Ok(p) => p,
            Err(msg) => return self.fail(msg),
        };
        used += taken;
        self.wire_len += used as u64;
        if done {
            self.phase = Phase::Done;
            self.consumed = used;
        }
        self.update_verdict();
        self.decision()
    }

    fn is_completed(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    fn consumed(&self) -> usize {
        self.consumed
    }

    fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        if !self.is_completed() {
            return Err(SerializeError("request is not complete".into()));
        }
        let packed = self
            .packed()
            .ok_or_else(|| SerializeError("request head missing".into()))?;
        pack::pack(&packed).map_err(|e| SerializeError(e.to_string()))
    }

    fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

//! Classifier capability: the boundary between the multiplexer and an incremental HTTP engine.
//!
//! An [`Engine`] hands out one [`Classifier`] per logical request. The multiplexer only ever
//! feeds bytes, asks whether the request completed and how many bytes of the last feed it
//! took, and asks for a serialized form when a dump is requested. Dropping a classifier
//! releases it.

use std::fmt;

/// Matched-rule identifier pair: rule id and the 1-based condition that decided it.
/// `0:0` means no rule matched and the default action applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatchPoint {
    pub rule: u32,
    pub condition: u32,
}

impl MatchPoint {
    pub const NONE: MatchPoint = MatchPoint {
        rule: 0,
        condition: 0,
    };

    pub fn new(rule: u32, condition: u32) -> Self {
        Self { rule, condition }
    }
}

impl fmt::Display for MatchPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rule, self.condition)
    }
}

/// Verdict returned by a single feed call.
///
/// `Accept`, `Deny` and `Pending` never end a request on their own; only
/// [`Classifier::is_completed`] does. `Error` is fatal for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept(MatchPoint),
    Deny(MatchPoint),
    /// More bytes are needed before a verdict exists.
    Pending,
    /// Engine failure; the message is available from [`Classifier::last_error`].
    Error,
}

impl Decision {
    pub fn is_error(&self) -> bool {
        matches!(self, Decision::Error)
    }

    pub fn match_point(&self) -> Option<MatchPoint> {
        match self {
            Decision::Accept(p) | Decision::Deny(p) => Some(*p),
            Decision::Pending | Decision::Error => None,
        }
    }
}

/// Serialization failure reported by a classifier.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SerializeError(pub String);

/// One request context. Lives from creation until it completes, fails, or the stream ends.
pub trait Classifier {
    /// Feed the next bytes of the stream. `bytes` may extend past the end of this request.
    fn feed(&mut self, bytes: &[u8]) -> Decision;

    /// True once the engine has seen the whole request.
    fn is_completed(&self) -> bool;

    /// Bytes of the most recent feed that belong to this request. Meaningful only once completed.
    fn consumed(&self) -> usize;

    /// Engine-owned opaque serialization of the request.
    fn serialize(&self) -> Result<Vec<u8>, SerializeError>;

    /// Diagnostic message for the last `Decision::Error`, if any.
    fn last_error(&self) -> Option<&str>;
}

/// Creates request contexts. Loaded once per run.
pub trait Engine {
    type Request: Classifier;

    fn new_request(&self) -> Result<Self::Request, EngineError>;
}

/// Engine construction or request allocation failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot load rules: {0}")]
    Rules(#[from] crate::engine::RuleError),
    #[error("cannot allocate request: {0}")]
    Allocation(String),
}

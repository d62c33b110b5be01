//! Built-in rule engine: a small conforming implementation of the classifier capability.

mod chunked;
pub mod pack;
mod request;
pub mod rules;

use std::path::Path;
use std::sync::Arc;

use crate::classifier::{Engine, EngineError};

pub use chunked::{BodySink, ChunkedDecoder};
pub use pack::{pack, unpack, PackError, PackedRequest};
pub use request::HttpRequest;
pub use rules::{Action, RuleError, RuleSet};

/// Engine loaded from a rule file; every request shares the rule set.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<RuleSet>,
}

impl RuleEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Load and validate a TOML rule file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let rules = RuleSet::load(path)?;
        tracing::debug!(path = %path.display(), rules = rules.rules.len(), "rules loaded");
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl Engine for RuleEngine {
    type Request = HttpRequest;

    fn new_request(&self) -> Result<HttpRequest, EngineError> {
        Ok(HttpRequest::new(Arc::clone(&self.rules)))
    }
}

//! Rule file: TOML rules evaluated in order against a parsed request.
//!
//! ```toml
//! default_action = "accept"
//!
//! [[rule]]
//! id = 10
//! action = "deny"
//! [[rule.condition]]
//! field = "header"
//! name = "User-Agent"
//! op = "contains"
//! value = "sqlmap"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::MatchPoint;

/// Default cap on a request head (request line + headers).
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;
/// Default cap on body bytes retained for body conditions and dumps.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Deny,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every condition must hold; the last one is reported.
    #[default]
    All,
    /// The first condition that holds decides.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Method,
    Path,
    Version,
    Header,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Equals,
    Prefix,
    Contains,
    Present,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    pub field: Field,
    /// Header name; header conditions only.
    #[serde(default)]
    pub name: Option<String>,
    pub op: Op,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub id: u32,
    pub action: Action,
    #[serde(default, rename = "match")]
    pub mode: MatchMode,
    #[serde(default, rename = "condition")]
    pub conditions: Vec<Condition>,
}

/// Parsed rule file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    #[serde(default = "default_action")]
    pub default_action: Action,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

fn default_action() -> Action {
    Action::Accept
}
fn default_max_header_bytes() -> usize {
    DEFAULT_MAX_HEADER_BYTES
}
fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            default_action: default_action(),
            max_header_bytes: default_max_header_bytes(),
            max_body_bytes: default_max_body_bytes(),
            rules: Vec::new(),
        }
    }
}

/// Rule file load or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rule {rule}: {reason}")]
    Invalid { rule: u32, reason: String },
}

fn invalid(rule: u32, reason: impl Into<String>) -> RuleError {
    RuleError::Invalid {
        rule,
        reason: reason.into(),
    }
}

/// What the rules see of a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub version: u8,
    pub headers: &'a [(String, Vec<u8>)],
    pub body: &'a [u8],
    pub body_complete: bool,
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let s = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self, RuleError> {
        let set: RuleSet = toml::from_str(s)?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id == 0 {
                return Err(invalid(0, "id 0 is reserved for the default action"));
            }
            if !seen.insert(rule.id) {
                return Err(invalid(rule.id, "duplicate id"));
            }
            if rule.conditions.is_empty() {
                return Err(invalid(rule.id, "no conditions"));
            }
            for (i, c) in rule.conditions.iter().enumerate() {
                let n = i + 1;
                match (c.field, &c.name) {
                    (Field::Header, None) => {
                        return Err(invalid(rule.id, format!("condition {n}: header needs a name")))
                    }
                    (Field::Header, Some(_)) | (_, None) => {}
                    (_, Some(_)) => {
                        return Err(invalid(
                            rule.id,
                            format!("condition {n}: name is only valid for header"),
                        ))
                    }
                }
                if c.op != Op::Present && c.value.is_none() {
                    return Err(invalid(rule.id, format!("condition {n}: missing value")));
                }
            }
        }
        Ok(())
    }

    /// First matching rule wins. `None` while a rule that needs the body cannot be decided yet.
    pub fn evaluate(&self, req: &RequestView<'_>) -> Option<(Action, MatchPoint)> {
        for rule in &self.rules {
            if !req.body_complete && rule.needs_body() {
                return None;
            }
            if let Some(cond) = rule.matches(req) {
                return Some((rule.action, MatchPoint::new(rule.id, cond)));
            }
        }
        Some((self.default_action, MatchPoint::NONE))
    }
}

impl Rule {
    pub fn needs_body(&self) -> bool {
        self.conditions.iter().any(|c| c.field == Field::Body)
    }

    /// 1-based index of the deciding condition, if the rule matches.
    fn matches(&self, req: &RequestView<'_>) -> Option<u32> {
        match self.mode {
            MatchMode::All => self
                .conditions
                .iter()
                .all(|c| c.matches(req))
                .then_some(self.conditions.len() as u32),
            MatchMode::Any => self
                .conditions
                .iter()
                .position(|c| c.matches(req))
                .map(|i| i as u32 + 1),
        }
    }
}

impl Condition {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        match self.field {
            Field::Method => self.test(req.method.as_bytes()),
            Field::Path => self.test(req.path.as_bytes()),
            Field::Version => self.test(format!("HTTP/1.{}", req.version).as_bytes()),
            Field::Body => match self.op {
                Op::Present => !req.body.is_empty(),
                _ => self.test(req.body),
            },
            Field::Header => {
                let name = self.name.as_deref().unwrap_or_default();
                let mut values = req
                    .headers
                    .iter()
                    .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.as_slice());
                match self.op {
                    Op::Present => values.next().is_some(),
                    _ => values.any(|v| self.test(v)),
                }
            }
        }
    }

    fn test(&self, subject: &[u8]) -> bool {
        let needle = self.value.as_deref().unwrap_or_default().as_bytes();
        if self.ignore_case {
            let subject = subject.to_ascii_lowercase();
            let needle = needle.to_ascii_lowercase();
            apply(self.op, &subject, &needle)
        } else {
            apply(self.op, subject, needle)
        }
    }
}

fn apply(op: Op, subject: &[u8], needle: &[u8]) -> bool {
    match op {
        Op::Equals => subject == needle,
        Op::Prefix => subject.starts_with(needle),
        Op::Contains => contains(subject, needle),
        Op::Present => true,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

//! Serialized form of a completed request: plain bincode, no framing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::rules::Action;

const MAX_PACKED_LEN: usize = 16 * 1024 * 1024; // 16 MiB

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedHeader {
    pub name: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedVerdict {
    pub action: Action,
    pub rule: u32,
    pub condition: u32,
}

/// Everything the rule engine knows about one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedRequest {
    pub method: String,
    pub path: String,
    /// Minor HTTP version: 0 or 1.
    pub version: u8,
    pub headers: Vec<PackedHeader>,
    pub chunked: bool,
    /// Retained body prefix, capped by the rule file's `max_body_bytes`.
    pub body: Vec<u8>,
    /// Full decoded body length.
    pub body_len: u64,
    /// SHA-256 of the full decoded body.
    pub body_sha256: [u8; 32],
    /// Request length on the wire, head included.
    pub wire_len: u64,
    pub verdict: Option<PackedVerdict>,
}

/// Encode a request for dumping.
pub fn pack(req: &PackedRequest) -> Result<Vec<u8>, PackError> {
    let bytes = bincode::serialize(req).map_err(PackError::Encode)?;
    if bytes.len() > MAX_PACKED_LEN {
        return Err(PackError::TooLarge);
    }
    Ok(bytes)
}

/// Decode a dump produced by [`pack`].
pub fn unpack(bytes: &[u8]) -> Result<PackedRequest, PackError> {
    if bytes.len() > MAX_PACKED_LEN {
        return Err(PackError::TooLarge);
    }
    bincode::deserialize(bytes).map_err(PackError::Decode)
}

/// SHA-256 digest of a body.
pub fn body_digest(body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.finalize().into()
}

/// Lowercase hex rendering of a digest, for display.
pub fn hex_digest(digest: &[u8; 32]) -> String {
    hex::encode(digest)
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("encode error: {0}")]
    Encode(bincode::Error),
    #[error("decode error: {0}")]
    Decode(bincode::Error),
    #[error("packed request too large")]
    TooLarge,
}

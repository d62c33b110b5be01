//! Dump writer: persist the serialized form of one completed request.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::classifier::{Classifier, SerializeError};

/// Dump file name for an ordinal.
pub fn dump_file_name(ordinal: u64) -> String {
    format!("hatt_request_{}.dump", ordinal)
}

/// Writes the single requested dump into `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpWriter {
    dir: PathBuf,
    target: u64,
}

impl DumpWriter {
    /// `target` 0 disables dumping.
    pub fn new(dir: impl Into<PathBuf>, target: u64) -> Self {
        Self {
            dir: dir.into(),
            target,
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn wants(&self, ordinal: u64) -> bool {
        self.target != 0 && self.target == ordinal
    }

    pub fn path_for(&self, ordinal: u64) -> PathBuf {
        self.dir.join(dump_file_name(ordinal))
    }

    /// Serialize `request` and write it atomically: temp file in the same directory, then rename.
    pub fn write<C: Classifier + ?Sized>(
        &self,
        request: &C,
        ordinal: u64,
    ) -> Result<PathBuf, DumpError> {
        let bytes = request.serialize()?;
        if bytes.is_empty() {
            return Err(DumpError::Empty);
        }
        let path = self.path_for(ordinal);
        write_atomic(&self.dir, &path, &bytes)?;
        Ok(path)
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Dump failure: serialization or file write.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("serialize error: {0}")]
    Serialize(#[from] SerializeError),
    #[error("serialized request is empty")]
    Empty,
    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
}

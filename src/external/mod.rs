//! External file references: the payload behind `External` leaves.
//!
//! A [`FileRef`] names a file on disk plus an optional SHA-256 checksum of
//! the contents it was last seen with. The engine treats it as an atomic
//! value and never opens the file; checksum validation is an explicit step
//! the declaration/reporting layers run before or after an evaluation.
//!
//! Relative paths are resolved against an explicit [`ResolutionContext`]
//! passed through the call chain. There is no ambient base directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Base directory for resolving relative [`FileRef`] paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    base_dir: PathBuf,
}

impl ResolutionContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute paths pass through untouched.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Reference to an external file, carried through the graph as one opaque
/// leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the referenced contents, if recorded.
    pub checksum: Option<String>,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(path: impl Into<PathBuf>, checksum: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            checksum: Some(checksum.into()),
        }
    }

    /// Recomputes the checksum and compares it against the recorded one.
    ///
    /// A ref without a recorded checksum always validates (there is nothing
    /// to compare against); the computed digest is returned either way so
    /// callers can persist it.
    pub fn validate(&self, ctx: &ResolutionContext) -> Result<ChecksumOutcome, ExternalDataError> {
        let resolved = ctx.resolve(&self.path);
        let contents = fs::read(&resolved).map_err(|source| ExternalDataError::Unreadable {
            path: resolved.clone(),
            source,
        })?;
        let computed = hex_digest(&contents);
        let matches = match &self.checksum {
            Some(recorded) => recorded == &computed,
            None => true,
        };
        Ok(ChecksumOutcome {
            path: self.path.clone(),
            resolved,
            recorded: self.checksum.clone(),
            computed,
            matches,
        })
    }
}

fn hex_digest(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        // write! into a String cannot fail
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Result of validating one [`FileRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumOutcome {
    pub path: PathBuf,
    pub resolved: PathBuf,
    pub recorded: Option<String>,
    pub computed: String,
    pub matches: bool,
}

impl ChecksumOutcome {
    /// A ref seen for the first time (no recorded checksum yet).
    pub fn is_new(&self) -> bool {
        self.recorded.is_none()
    }
}

/// Aggregated validation over every file ref in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumReport {
    pub entries: Vec<ChecksumOutcome>,
}

impl ChecksumReport {
    pub fn validate_all<'a>(
        refs: impl IntoIterator<Item = &'a FileRef>,
        ctx: &ResolutionContext,
    ) -> Result<Self, ExternalDataError> {
        let mut entries = Vec::new();
        for file_ref in refs {
            entries.push(file_ref.validate(ctx)?);
        }
        Ok(Self { entries })
    }

    /// True if any previously recorded checksum no longer matches.
    pub fn has_stale_entries(&self) -> bool {
        self.entries.iter().any(|e| !e.matches && !e.is_new())
    }

    pub fn stale_entries(&self) -> impl Iterator<Item = &ChecksumOutcome> {
        self.entries.iter().filter(|e| !e.matches && !e.is_new())
    }
}

#[derive(Error, Debug)]
pub enum ExternalDataError {
    #[error("cannot read external file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn validates_without_recorded_checksum() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.csv", b"1,2,3\n");
        let ctx = ResolutionContext::new(dir.path());

        let outcome = FileRef::new("data.csv").validate(&ctx).unwrap();
        assert!(outcome.matches);
        assert!(outcome.is_new());
        assert_eq!(outcome.computed.len(), 64);
    }

    #[test]
    fn detects_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.csv", b"1,2,3\n");
        let ctx = ResolutionContext::new(dir.path());

        let recorded = FileRef::new("data.csv").validate(&ctx).unwrap().computed;
        write_file(dir.path(), "data.csv", b"changed");

        let outcome = FileRef::with_checksum("data.csv", recorded)
            .validate(&ctx)
            .unwrap();
        assert!(!outcome.matches);
        assert!(!outcome.is_new());
    }

    #[test]
    fn report_flags_only_stale_recorded_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.bin", b"aaa");
        write_file(dir.path(), "b.bin", b"bbb");
        let ctx = ResolutionContext::new(dir.path());

        let good = FileRef::new("a.bin").validate(&ctx).unwrap().computed;
        let refs = vec![
            FileRef::with_checksum("a.bin", good),
            FileRef::with_checksum("b.bin", "0".repeat(64)),
            FileRef::new("a.bin"),
        ];
        let report = ChecksumReport::validate_all(refs.iter(), &ctx).unwrap();
        assert!(report.has_stale_entries());
        assert_eq!(report.stale_entries().count(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ResolutionContext::new(dir.path());
        assert!(FileRef::new("absent.dat").validate(&ctx).is_err());
    }

    #[test]
    fn absolute_paths_bypass_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let abs = write_file(dir.path(), "abs.dat", b"x");
        let ctx = ResolutionContext::new("/nonexistent/base");
        assert!(FileRef::new(&abs).validate(&ctx).unwrap().matches);
    }
}

//! Rewrite jobs - one input/output path pair per module to rewrite.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Lifecycle of a job inside the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InProgress,
    Done,
}

/// A single module rewrite: where to read it, where to write it, and the
/// identifier pair derived from the two file stems.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Old identifier, the input file stem.
    pub input_ident: String,
    /// New identifier, the output file stem.
    pub output_ident: String,
    pub state: JobState,
}

impl RewriteJob {
    /// Build a job from an input and output path. Both paths are made
    /// absolute so in-place rewrites are detected by plain equality.
    pub fn new(input_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<Self> {
        let input_path = std::path::absolute(input_path)?;
        let output_path = std::path::absolute(output_path)?;
        let input_ident = ident_for(&input_path)?;
        let output_ident = ident_for(&output_path)?;
        Ok(Self {
            input_path,
            output_path,
            input_ident,
            output_ident,
            state: JobState::Pending,
        })
    }

    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// Whether the rewrite overwrites its own input file.
    pub fn is_in_place(&self) -> bool {
        self.input_path == self.output_path
    }
}

fn ident_for(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idents_derive_from_file_stems() {
        let job = RewriteJob::new("work/Acme.rmod", "work/Vendor.Acme.rmod").unwrap();
        assert_eq!(job.input_ident, "Acme");
        assert_eq!(job.output_ident, "Vendor.Acme");
        assert_eq!(job.state, JobState::Pending);
        assert!(!job.is_done());
    }

    #[test]
    fn test_paths_are_absolutized() {
        let job = RewriteJob::new("Acme.rmod", "Vendor.Acme.rmod").unwrap();
        assert!(job.input_path.is_absolute());
        assert!(job.output_path.is_absolute());
        assert!(!job.is_in_place());
    }

    #[test]
    fn test_in_place_detected_after_absolutizing() {
        let job = RewriteJob::new("work/Acme.rmod", "work/Acme.rmod").unwrap();
        assert!(job.is_in_place());
        assert_eq!(job.input_ident, job.output_ident);
    }

    #[test]
    fn test_path_without_stem_rejected() {
        let result = RewriteJob::new("/", "out.rmod");
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }
}

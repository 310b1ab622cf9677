use crate::domain::ZeusDiffError;
use globset::Glob;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_PATTERN: &str = "hdfaa.???";

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("invalid output file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("failed to read output directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<SeriesError> for ZeusDiffError {
    fn from(error: SeriesError) -> Self {
        let message = error.to_string();
        match error {
            SeriesError::InvalidPattern { .. } => {
                ZeusDiffError::input_validation("INPUT.SERIES_PATTERN", message)
            }
            SeriesError::ReadDirectory { .. } => {
                ZeusDiffError::io_system("IO.SERIES_DIRECTORY", message)
            }
        }
    }
}

/// The dump files of one run, sorted by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSeries {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl OutputSeries {
    /// Lists regular files directly inside `dir` whose name matches `pattern`.
    pub fn discover(dir: impl AsRef<Path>, pattern: &str) -> Result<Self, SeriesError> {
        let dir = dir.as_ref();
        let matcher = Glob::new(pattern)
            .map_err(|source| SeriesError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        let read_error = |source| SeriesError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if !entry.file_type().map_err(read_error)?.is_file() {
                continue;
            }
            if matcher.is_match(entry.file_name()) {
                files.push(entry.path());
            }
        }
        files.sort();

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

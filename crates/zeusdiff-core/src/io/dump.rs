use super::FieldSource;
use crate::domain::{Dataset, Field, FieldAlias, ZeusDiffError, field_alias};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to read dump file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse dump file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize dump file '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write dump file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<DumpError> for ZeusDiffError {
    fn from(error: DumpError) -> Self {
        let message = error.to_string();
        match error {
            DumpError::Read { .. } => ZeusDiffError::io_system("IO.DUMP_READ", message),
            DumpError::Parse { .. } => ZeusDiffError::input_validation("INPUT.DUMP_PARSE", message),
            DumpError::Serialize { .. } => ZeusDiffError::internal("SYS.DUMP_SERIALIZE", message),
            DumpError::Write { .. } => ZeusDiffError::io_system("IO.DUMP_WRITE", message),
        }
    }
}

/// One dataset as stored on disk. `null` entries in `data` stand for NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDataset {
    pub shape: Vec<usize>,
    pub data: Vec<Option<f64>>,
}

/// A dump file: every stored dataset keyed by its stored name.
///
/// The file is read completely when opened, so no handle is held once
/// `open` returns, whether it succeeds or fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpFile {
    #[serde(default)]
    pub datasets: BTreeMap<String, StoredDataset>,
}

impl DumpFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DumpError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DumpError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Stores every field of `dataset` that has a registered alias; other
    /// fields have no stored name and are left out.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let datasets = dataset
            .fields()
            .filter_map(|field| {
                let alias = field_alias(field.name())?;
                let stored = StoredDataset {
                    shape: field.shape().to_vec(),
                    data: field
                        .values()
                        .iter()
                        .map(|value| (!value.is_nan()).then_some(*value))
                        .collect(),
                };
                Some((alias.stored_name.to_string(), stored))
            })
            .collect();
        Self { datasets }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), DumpError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| DumpError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| DumpError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FieldSource for DumpFile {
    fn load(&self, alias: &FieldAlias) -> Option<Field> {
        let stored = self.datasets.get(alias.stored_name)?;
        let data = stored
            .data
            .iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect();
        match Field::from_shape_vec(alias.name, &stored.shape, data) {
            Ok(field) => Some(field),
            Err(error) => {
                warn!(
                    field = alias.name,
                    stored_name = alias.stored_name,
                    %error,
                    "dropping malformed dataset"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DumpError, DumpFile, StoredDataset};
    use crate::domain::{Dataset, ErrorCategory, ZeusDiffError};
    use crate::io::FieldSource;
    use ndarray::array;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_fields_by_stored_name() {
        let dump: DumpFile = serde_json::from_str(
            r#"{"datasets": {
                "   time": {"shape": [1], "data": [0.5]},
                " i velocity": {"shape": [2, 1, 2], "data": [1.0, 2.0, null, 4.0]}
            }}"#,
        )
        .expect("dump JSON should parse");

        let dataset = Dataset::load(&dump);
        assert_eq!(dataset.time(), Some(0.5));

        let velocity = dataset.get("v1").expect("v1 should load");
        assert_eq!(velocity.shape(), &[2, 2]);
        assert!(velocity.values()[[1, 0]].is_nan());
        assert!(dataset.get("v2").is_none());
    }

    #[test]
    fn malformed_dataset_is_absent_rather_than_an_error() {
        let mut dump = DumpFile::default();
        dump.datasets.insert(
            "gas density".to_string(),
            StoredDataset {
                shape: vec![2, 2],
                data: vec![Some(1.0)],
            },
        );

        let alias = crate::domain::field_alias("d").expect("d is registered");
        assert!(dump.load(alias).is_none());
    }

    #[test]
    fn written_dump_reopens_with_nan_preserved() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("hdfaa.000");
        let dataset = Dataset::new()
            .with_field("t", array![2.0].into_dyn())
            .with_field("d", array![[1.0, f64::NAN], [3.0, 4.0]].into_dyn())
            .with_field("scratch", array![9.0].into_dyn());

        DumpFile::from_dataset(&dataset)
            .write(&path)
            .expect("dump should be written");
        let reopened = Dataset::load(&DumpFile::open(&path).expect("dump should reopen"));

        assert_eq!(reopened.time(), Some(2.0));
        assert!(reopened.get("d").expect("d").values()[[0, 1]].is_nan());
        assert!(reopened.get("scratch").is_none());
    }

    #[test]
    fn open_errors_map_to_categories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let missing = DumpFile::open(temp.path().join("absent")).expect_err("file is missing");
        assert!(matches!(missing, DumpError::Read { .. }));
        assert_eq!(
            ZeusDiffError::from(missing).category(),
            ErrorCategory::IoSystemError
        );

        let garbage = temp.path().join("garbage");
        fs::write(&garbage, "not json").expect("fixture should be written");
        let parse = DumpFile::open(&garbage).expect_err("content is not JSON");
        assert_eq!(
            ZeusDiffError::from(parse).placeholder(),
            "INPUT.DUMP_PARSE"
        );
    }
}

pub mod dump;
pub mod series;

pub use dump::{DumpError, DumpFile, StoredDataset};
pub use series::{OutputSeries, SeriesError};

use crate::domain::{Dataset, FIELD_ALIASES, Field, FieldAlias};
use std::path::Path;

/// Anything that can hand out fields by alias. Missing or unreadable data is
/// reported as absent, never as an error.
pub trait FieldSource {
    fn load(&self, alias: &FieldAlias) -> Option<Field>;
}

impl Dataset {
    /// Loads every registered alias the source provides.
    pub fn load(source: &impl FieldSource) -> Self {
        Self::from_fields(FIELD_ALIASES.iter().filter_map(|alias| source.load(alias)))
    }
}

pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset, DumpError> {
    let dump = DumpFile::open(path)?;
    Ok(Dataset::load(&dump))
}

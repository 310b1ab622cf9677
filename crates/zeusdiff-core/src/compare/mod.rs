pub mod comparator;
pub mod dataset;
pub mod policy;
pub mod report;

pub use comparator::{
    ComparisonResult, Divergence, ElementwiseComparator, FieldComparator, ShapeMismatch, compare,
};
pub use dataset::{
    COORDINATE_AXES, CompareOptions, ComparisonFailure, ComparisonOutcome, DEFAULT_RTOL,
    DatasetComparator, DatasetSide, FieldComparison, KINEMATIC_FIELDS, PHYSICAL_FIELDS,
    TIME_FIELD, Verdict, compare_files, policy_fields,
};
pub use policy::{ComparisonMode, EqualityPolicy, PolicyError, UnknownFieldError};
pub use report::{SkipSet, divergence_lines, render_outcome, show_divergence};

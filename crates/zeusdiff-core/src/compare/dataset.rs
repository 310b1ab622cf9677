use super::comparator::{
    ComparisonResult, Divergence, ElementwiseComparator, FieldComparator, ShapeMismatch,
};
use super::policy::{ComparisonMode, EqualityPolicy, UnknownFieldError};
use crate::domain::{Dataset, Field};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

pub const TIME_FIELD: &str = "t";
pub const COORDINATE_AXES: [&str; 3] = ["x1", "x2", "x3"];
pub const KINEMATIC_FIELDS: [&str; 3] = ["v1", "v2", "v3"];
pub const PHYSICAL_FIELDS: [&str; 3] = ["e", "d", "gp"];

pub const DEFAULT_RTOL: f64 = 1e-8;

/// Fields whose comparison mode comes from the equality policy. The time
/// stamp and the coordinates are always compared exactly.
pub fn policy_fields() -> impl Iterator<Item = &'static str> {
    KINEMATIC_FIELDS.into_iter().chain(PHYSICAL_FIELDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompareOptions {
    pub rtol: f64,
    /// Abort the pair on the first kinematic or physical divergence.
    pub unforgiving: bool,
    /// Print every mismatched cell, not only the per-field summary.
    pub verbose: bool,
    /// Skip the time stamp check.
    pub force: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            rtol: DEFAULT_RTOL,
            unforgiving: true,
            verbose: true,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSide {
    Left,
    Right,
}

impl Display for DatasetSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Left => "first",
            Self::Right => "second",
        })
    }
}

/// Why the comparison of a file pair stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonFailure {
    #[error("{field} differs [{value1} != {value2}]")]
    StructuralMismatch {
        field: String,
        value1: f64,
        value2: f64,
    },
    #[error("{field} differs")]
    CoordinateDivergence { field: String },
    #[error("{field} differs (max = {max_relative_error})")]
    FieldDivergence {
        field: String,
        max_relative_error: f64,
    },
    #[error("{field} is missing from the {side} dataset")]
    MissingField { field: String, side: DatasetSide },
    #[error("{field} has shape {left:?} != {right:?}")]
    ShapeMismatch {
        field: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

impl ComparisonFailure {
    pub fn field(&self) -> &str {
        match self {
            Self::StructuralMismatch { field, .. }
            | Self::CoordinateDivergence { field }
            | Self::FieldDivergence { field, .. }
            | Self::MissingField { field, .. }
            | Self::ShapeMismatch { field, .. } => field,
        }
    }
}

impl From<ShapeMismatch> for ComparisonFailure {
    fn from(error: ShapeMismatch) -> Self {
        Self::ShapeMismatch {
            field: error.field,
            left: error.left,
            right: error.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldComparison {
    pub field: String,
    pub result: ComparisonResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Diverged,
    Aborted,
}

impl Verdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Diverged => "DIVERGED",
            Self::Aborted => "ABORTED",
        }
    }
}

/// Results of one file-pair comparison, in checking order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonOutcome {
    pub results: Vec<FieldComparison>,
    pub failure: Option<ComparisonFailure>,
}

impl ComparisonOutcome {
    pub fn is_match(&self) -> bool {
        self.failure.is_none() && self.results.iter().all(|entry| entry.result.is_match())
    }

    pub fn verdict(&self) -> Verdict {
        if self.failure.is_some() {
            Verdict::Aborted
        } else if self.is_match() {
            Verdict::Match
        } else {
            Verdict::Diverged
        }
    }

    pub fn divergences(&self) -> impl Iterator<Item = &Divergence> {
        self.results
            .iter()
            .filter_map(|entry| entry.result.divergence())
    }

    pub fn divergence_for(&self, field: &str) -> Option<&Divergence> {
        self.divergences().find(|divergence| divergence.field == field)
    }
}

enum Interrupt {
    Failure(ComparisonFailure),
    Contract(UnknownFieldError),
}

impl From<ComparisonFailure> for Interrupt {
    fn from(failure: ComparisonFailure) -> Self {
        Self::Failure(failure)
    }
}

impl From<ShapeMismatch> for Interrupt {
    fn from(error: ShapeMismatch) -> Self {
        Self::Failure(error.into())
    }
}

impl From<UnknownFieldError> for Interrupt {
    fn from(error: UnknownFieldError) -> Self {
        Self::Contract(error)
    }
}

/// Runs the field comparator over a fixed, ordered set of fields for one
/// dataset pair.
///
/// Structural checks (time stamp, axis sizes, coordinate values) always run
/// first and always abort the pair. Kinematic and physical fields abort only
/// in unforgiving mode; otherwise every divergence is recorded.
#[derive(Debug, Clone)]
pub struct DatasetComparator<C = ElementwiseComparator> {
    policy: EqualityPolicy,
    options: CompareOptions,
    comparator: C,
}

impl DatasetComparator<ElementwiseComparator> {
    pub fn new(options: CompareOptions) -> Self {
        Self {
            policy: EqualityPolicy::with_rtol(options.rtol),
            options,
            comparator: ElementwiseComparator,
        }
    }
}

impl<C: FieldComparator> DatasetComparator<C> {
    pub fn with_policy(mut self, policy: EqualityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_comparator<D: FieldComparator>(self, comparator: D) -> DatasetComparator<D> {
        DatasetComparator {
            policy: self.policy,
            options: self.options,
            comparator,
        }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Errors only when the policy does not cover a compared field, which is
    /// a configuration bug rather than a property of the data.
    pub fn compare(
        &self,
        left: &Dataset,
        right: &Dataset,
    ) -> Result<ComparisonOutcome, UnknownFieldError> {
        let mut outcome = ComparisonOutcome::default();
        match self.run_checks(left, right, &mut outcome.results) {
            Ok(()) => {}
            Err(Interrupt::Failure(failure)) => {
                info!(field = failure.field(), %failure, "comparison aborted");
                outcome.failure = Some(failure);
            }
            Err(Interrupt::Contract(error)) => return Err(error),
        }
        Ok(outcome)
    }

    fn run_checks(
        &self,
        left: &Dataset,
        right: &Dataset,
        results: &mut Vec<FieldComparison>,
    ) -> Result<(), Interrupt> {
        if !self.options.force {
            let t1 = require(left, TIME_FIELD, DatasetSide::Left)?.first();
            let t2 = require(right, TIME_FIELD, DatasetSide::Right)?.first();
            let (t1, t2) = (t1.unwrap_or(f64::NAN), t2.unwrap_or(f64::NAN));
            if t1 != t2 {
                return Err(ComparisonFailure::StructuralMismatch {
                    field: TIME_FIELD.to_string(),
                    value1: t1,
                    value2: t2,
                }
                .into());
            }
        }

        for axis in COORDINATE_AXES {
            let c1 = require(left, axis, DatasetSide::Left)?;
            let c2 = require(right, axis, DatasetSide::Right)?;
            if c1.len() != c2.len() {
                return Err(ComparisonFailure::StructuralMismatch {
                    field: axis.to_string(),
                    value1: c1.len() as f64,
                    value2: c2.len() as f64,
                }
                .into());
            }
        }

        for axis in COORDINATE_AXES {
            let result = self.compare_field(left, right, axis, ComparisonMode::Exact)?;
            let diverged = !result.is_match();
            results.push(FieldComparison {
                field: axis.to_string(),
                result,
            });
            if diverged {
                return Err(ComparisonFailure::CoordinateDivergence {
                    field: axis.to_string(),
                }
                .into());
            }
        }

        for field in policy_fields() {
            let mode = self.policy.mode_for(field)?;
            let result = self.compare_field(left, right, field, mode)?;
            let max_relative_error = result.divergence().map(Divergence::max_relative_error);
            results.push(FieldComparison {
                field: field.to_string(),
                result,
            });

            if let Some(max_relative_error) = max_relative_error {
                if self.options.unforgiving {
                    return Err(ComparisonFailure::FieldDivergence {
                        field: field.to_string(),
                        max_relative_error,
                    }
                    .into());
                }
                warn!(field, max_relative_error, "field differs, continuing");
            }
        }

        Ok(())
    }

    fn compare_field(
        &self,
        left: &Dataset,
        right: &Dataset,
        name: &str,
        mode: ComparisonMode,
    ) -> Result<ComparisonResult, Interrupt> {
        let lhs = require(left, name, DatasetSide::Left)?;
        let rhs = require(right, name, DatasetSide::Right)?;
        debug!(field = name, ?mode, "comparing field");
        Ok(self.comparator.compare(lhs, rhs, mode)?)
    }
}

fn require<'a>(
    dataset: &'a Dataset,
    name: &str,
    side: DatasetSide,
) -> Result<&'a Field, ComparisonFailure> {
    dataset
        .get(name)
        .ok_or_else(|| ComparisonFailure::MissingField {
            field: name.to_string(),
            side,
        })
}

/// Compares two datasets with the built-in equality policy for `options.rtol`.
pub fn compare_files(
    left: &Dataset,
    right: &Dataset,
    options: &CompareOptions,
) -> Result<ComparisonOutcome, UnknownFieldError> {
    DatasetComparator::new(*options).compare(left, right)
}

#[cfg(test)]
mod tests {
    use super::{
        CompareOptions, ComparisonFailure, DatasetComparator, DatasetSide, Verdict, compare_files,
        policy_fields,
    };
    use crate::compare::policy::EqualityPolicy;
    use crate::domain::Dataset;
    use ndarray::array;

    fn dataset(time: f64) -> Dataset {
        let mut dataset = Dataset::new()
            .with_field("t", array![time].into_dyn())
            .with_field("x1", array![0.0, 0.5, 1.0].into_dyn())
            .with_field("x2", array![0.0, 1.0].into_dyn())
            .with_field("x3", array![0.25].into_dyn());
        for (offset, name) in ["v1", "v2", "v3", "e", "d", "gp"].into_iter().enumerate() {
            let base = offset as f64 + 1.0;
            dataset = dataset.with_field(
                name,
                array![[base, base * 2.0, base * 3.0], [base * 4.0, base * 5.0, base * 6.0]]
                    .into_dyn(),
            );
        }
        dataset
    }

    #[test]
    fn identical_datasets_match() {
        let outcome = compare_files(&dataset(1.0), &dataset(1.0), &CompareOptions::default())
            .expect("built-in policy covers every field");

        assert!(outcome.is_match());
        assert_eq!(outcome.verdict(), Verdict::Match);
        assert_eq!(outcome.results.len(), 9);
    }

    #[test]
    fn missing_field_aborts_with_side() {
        let left = dataset(1.0);
        let right =
            Dataset::from_fields(left.fields().filter(|field| field.name() != "e").cloned());

        let outcome =
            compare_files(&left, &right, &CompareOptions::default()).expect("policy covers");
        assert_eq!(
            outcome.failure,
            Some(ComparisonFailure::MissingField {
                field: "e".to_string(),
                side: DatasetSide::Right,
            })
        );
        assert_eq!(outcome.verdict(), Verdict::Aborted);
    }

    #[test]
    fn forced_comparison_tolerates_absent_time_stamps() {
        let left = dataset(1.0);
        let right =
            Dataset::from_fields(left.fields().filter(|field| field.name() != "t").cloned());
        let options = CompareOptions {
            force: true,
            ..CompareOptions::default()
        };

        let outcome = compare_files(&left, &right, &options).expect("policy covers");
        assert!(outcome.is_match());
    }

    #[test]
    fn shape_mismatch_in_physical_field_is_structural() {
        let left = dataset(1.0);
        let right = dataset(1.0).with_field("d", array![1.0, 2.0].into_dyn());

        let outcome =
            compare_files(&left, &right, &CompareOptions::default()).expect("policy covers");
        let failure = outcome.failure.expect("shapes differ");
        assert!(matches!(failure, ComparisonFailure::ShapeMismatch { .. }));
        assert_eq!(failure.field(), "d");
    }

    #[test]
    fn policy_without_velocity_category_is_a_contract_error() {
        let policy = EqualityPolicy::from_policy_json(
            r#"{ "categories": [ { "id": "grid", "mode": "exact", "fields": ["x?"] } ] }"#,
            1e-8,
        )
        .expect("policy should parse");
        let comparator = DatasetComparator::new(CompareOptions::default()).with_policy(policy);

        let error = comparator
            .compare(&dataset(1.0), &dataset(1.0))
            .expect_err("v1 is not covered");
        assert_eq!(error.field, "v1");
    }

    #[test]
    fn coordinates_stay_exact_under_a_tolerant_policy() {
        let policy = EqualityPolicy::from_policy_json(
            r#"{ "categories": [
                { "id": "loose", "mode": "tolerant", "fields": ["*"],
                  "tolerance": { "relTol": 0.5 } }
            ] }"#,
            1e-8,
        )
        .expect("policy should parse");
        let comparator = DatasetComparator::new(CompareOptions::default()).with_policy(policy);
        let right = dataset(1.0).with_field("x1", array![0.0, 0.5, 1.0 + 1e-12].into_dyn());

        let outcome = comparator
            .compare(&dataset(1.0), &right)
            .expect("policy covers every field");
        assert_eq!(
            outcome.failure,
            Some(ComparisonFailure::CoordinateDivergence {
                field: "x1".to_string()
            })
        );
    }

    #[test]
    fn policy_is_only_consulted_for_evolved_fields() {
        assert_eq!(
            policy_fields().collect::<Vec<_>>(),
            vec!["v1", "v2", "v3", "e", "d", "gp"]
        );
    }

    #[test]
    fn forgiving_mode_records_every_divergent_field() {
        let left = dataset(1.0);
        let right = dataset(1.0)
            .with_field("v2", array![[2.0, 4.0, 6.0], [8.0, 10.0, 12.5]].into_dyn())
            .with_field("gp", array![[6.0, 12.0, 18.0], [24.0, 30.0, 0.0]].into_dyn());
        let options = CompareOptions {
            unforgiving: false,
            ..CompareOptions::default()
        };

        let outcome = compare_files(&left, &right, &options).expect("policy covers");
        assert_eq!(outcome.verdict(), Verdict::Diverged);
        assert_eq!(
            outcome
                .divergences()
                .map(|divergence| divergence.field.as_str())
                .collect::<Vec<_>>(),
            vec!["v2", "gp"]
        );
        assert_eq!(outcome.results.len(), 9);
        assert_eq!(
            outcome
                .divergence_for("gp")
                .map(|divergence| divergence.max_relative_error()),
            Some(1.0)
        );
    }
}

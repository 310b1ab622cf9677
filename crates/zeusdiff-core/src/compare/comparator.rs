use super::policy::ComparisonMode;
use crate::domain::Field;
use crate::numerics::{absolute_error, is_close_symmetric, max_value, relative_error};
use ndarray::{ArrayD, Dimension, Zip};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonResult {
    Match,
    Divergence(Divergence),
}

impl ComparisonResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            Self::Match => None,
            Self::Divergence(divergence) => Some(divergence),
        }
    }
}

/// Per-cell error detail for a field pair that failed its equality test.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub field: String,
    pub relative_error: ArrayD<f64>,
    pub absolute_error: ArrayD<f64>,
    /// Every multi-index with nonzero absolute error, in row-major order.
    pub mismatch_locations: Vec<Vec<usize>>,
    pub tolerance: f64,
}

impl Divergence {
    pub fn max_relative_error(&self) -> f64 {
        max_value(self.relative_error.iter())
    }

    pub fn max_absolute_error(&self) -> f64 {
        max_value(self.absolute_error.iter())
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatch_locations.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' has shape {left:?} in one dataset and {right:?} in the other")]
pub struct ShapeMismatch {
    pub field: String,
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

/// Compares one pair of same-named fields under a comparison mode.
pub trait FieldComparator {
    fn compare(
        &self,
        left: &Field,
        right: &Field,
        mode: ComparisonMode,
    ) -> Result<ComparisonResult, ShapeMismatch>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ElementwiseComparator;

impl FieldComparator for ElementwiseComparator {
    fn compare(
        &self,
        left: &Field,
        right: &Field,
        mode: ComparisonMode,
    ) -> Result<ComparisonResult, ShapeMismatch> {
        compare(left, right, mode)
    }
}

/// Element-wise equality test of two fields.
///
/// Exact mode requires literal equality of every element, so any NaN
/// diverges. Tolerant mode requires every element to be close with either
/// field taken as the reference, so the verdict does not depend on which
/// side is `left`.
pub fn compare(
    left: &Field,
    right: &Field,
    mode: ComparisonMode,
) -> Result<ComparisonResult, ShapeMismatch> {
    if left.shape() != right.shape() {
        return Err(ShapeMismatch {
            field: left.name().to_string(),
            left: left.shape().to_vec(),
            right: right.shape().to_vec(),
        });
    }

    let passes = match mode {
        ComparisonMode::Exact => Zip::from(left.values())
            .and(right.values())
            .all(|lhs, rhs| lhs == rhs),
        ComparisonMode::Tolerant { rtol, atol } => Zip::from(left.values())
            .and(right.values())
            .all(|&lhs, &rhs| is_close_symmetric(lhs, rhs, rtol, atol)),
    };

    debug!(field = left.name(), ?mode, passes, "compared field pair");
    if passes {
        return Ok(ComparisonResult::Match);
    }

    Ok(ComparisonResult::Divergence(divergence(left, right, mode.rtol())))
}

fn divergence(left: &Field, right: &Field, tolerance: f64) -> Divergence {
    let absolute = Zip::from(left.values())
        .and(right.values())
        .map_collect(|&lhs, &rhs| absolute_error(lhs, rhs));
    let relative = Zip::from(left.values())
        .and(right.values())
        .map_collect(|&lhs, &rhs| relative_error(lhs, rhs));
    let mismatch_locations = absolute
        .indexed_iter()
        .filter(|(_, error)| **error != 0.0)
        .map(|(index, _)| index.slice().to_vec())
        .collect();

    Divergence {
        field: left.name().to_string(),
        relative_error: relative,
        absolute_error: absolute,
        mismatch_locations,
        tolerance,
    }
}

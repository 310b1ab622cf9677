use super::comparator::Divergence;
use super::dataset::{CompareOptions, ComparisonFailure, ComparisonOutcome};
use crate::numerics::format_scientific;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Grid indices excluded from per-cell output, per axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    pub i: BTreeSet<usize>,
    pub j: BTreeSet<usize>,
    pub k: BTreeSet<usize>,
}

impl SkipSet {
    pub fn new(
        i: impl IntoIterator<Item = usize>,
        j: impl IntoIterator<Item = usize>,
        k: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            i: i.into_iter().collect(),
            j: j.into_iter().collect(),
            k: k.into_iter().collect(),
        }
    }

    pub fn excludes(&self, (i, j, k): (usize, usize, usize)) -> bool {
        self.i.contains(&i) || self.j.contains(&j) || self.k.contains(&k)
    }
}

/// Reads a row-major multi-index as `(i, j, k)`: `i` is the fastest axis and
/// axes a squeezed field no longer has read as zero.
pub fn grid_indices(location: &[usize]) -> (usize, usize, usize) {
    let from_end = |offset: usize| {
        location
            .len()
            .checked_sub(offset)
            .map_or(0, |index| location[index])
    };
    (from_end(1), from_end(2), from_end(3))
}

/// One line per mismatched cell that is not skipped and whose relative error
/// exceeds the divergence tolerance, in mismatch-scan order.
pub fn divergence_lines(divergence: &Divergence, skip: &SkipSet) -> Vec<String> {
    divergence
        .mismatch_locations
        .iter()
        .filter_map(|location| {
            let indices = grid_indices(location);
            if skip.excludes(indices) {
                return None;
            }

            let relative = divergence.relative_error[location.as_slice()];
            if relative <= divergence.tolerance {
                return None;
            }

            let absolute = divergence.absolute_error[location.as_slice()];
            let (i, j, k) = indices;
            Some(format!(
                "    Does not match at ({:4},{:4},{:4})  |  diff = ({}, {})",
                i,
                j,
                k,
                format_scientific(relative, 8, 2),
                format_scientific(absolute, 8, 2)
            ))
        })
        .collect()
}

pub fn show_divergence(
    divergence: &Divergence,
    skip: &SkipSet,
    out: &mut impl Write,
) -> io::Result<()> {
    for line in divergence_lines(divergence, skip) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn divergence_summary_line(divergence: &Divergence) -> String {
    format!(
        "  Files do not match: {} differs (max = {}) ",
        divergence.field,
        format_scientific(divergence.max_relative_error(), 8, 2)
    )
}

pub fn failure_line(failure: &ComparisonFailure) -> String {
    match failure {
        ComparisonFailure::StructuralMismatch {
            field,
            value1,
            value2,
        } => format!(
            "  Cannot compare files: {} differs [{} != {}]",
            field,
            format_scientific(*value1, 18, 12),
            format_scientific(*value2, 18, 12)
        ),
        ComparisonFailure::CoordinateDivergence { field } => {
            format!("  Cannot compare files: {field} differs")
        }
        ComparisonFailure::FieldDivergence {
            field,
            max_relative_error,
        } => format!(
            "  Files do not match: {} differs (max = {}) ",
            field,
            format_scientific(*max_relative_error, 8, 2)
        ),
        ComparisonFailure::MissingField { .. } | ComparisonFailure::ShapeMismatch { .. } => {
            format!("  Cannot compare files: {failure}")
        }
    }
}

/// Writes the diagnostics for one pair in the order they were produced:
/// recorded divergences first, then the reason the pair was aborted.
pub fn render_outcome(
    outcome: &ComparisonOutcome,
    options: &CompareOptions,
    skip: &SkipSet,
    out: &mut impl Write,
) -> io::Result<()> {
    let aborted_field = outcome.failure.as_ref().map(ComparisonFailure::field);

    for divergence in outcome.divergences() {
        if Some(divergence.field.as_str()) == aborted_field {
            continue;
        }
        writeln!(out, "{}", divergence_summary_line(divergence))?;
        if options.verbose {
            show_divergence(divergence, skip, out)?;
        }
    }

    if let Some(failure) = &outcome.failure {
        writeln!(out, "{}", failure_line(failure))?;
        // Coordinate divergences are structural, so their cells are never dumped.
        if let ComparisonFailure::FieldDivergence { field, .. } = failure {
            match outcome.divergence_for(field) {
                Some(divergence) if options.verbose => show_divergence(divergence, skip, out)?,
                _ => {}
            }
        }
    }

    Ok(())
}

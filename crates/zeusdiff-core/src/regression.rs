use crate::compare::{
    CompareOptions, ComparisonFailure, ComparisonOutcome, DatasetComparator, EqualityPolicy,
    SkipSet, Verdict, policy_fields, render_outcome,
};
use crate::domain::{ZeusDiffError, ZeusDiffResult};
use crate::io::series::DEFAULT_FILE_PATTERN;
use crate::io::{OutputSeries, load_dataset};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub file_pattern: String,
    pub options: CompareOptions,
    pub skip: SkipSet,
    pub policy_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl CollectionConfig {
    pub fn new(baseline_dir: impl Into<PathBuf>, actual_dir: impl Into<PathBuf>) -> Self {
        Self {
            baseline_dir: baseline_dir.into(),
            actual_dir: actual_dir.into(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            options: CompareOptions::default(),
            skip: SkipSet::default(),
            policy_path: None,
            report_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub baseline_dir: String,
    pub actual_dir: String,
    pub file_pattern: String,
    pub options: CompareOptions,
    pub pair_count: usize,
    pub matched_pair_count: usize,
    pub failed_pair_count: usize,
    /// Files past the end of the shorter series; they are never compared.
    pub unmatched_files: Vec<String>,
    pub pairs: Vec<PairReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub baseline_path: String,
    pub actual_path: String,
    pub passed: bool,
    /// Absent when either file could not be loaded.
    pub verdict: Option<Verdict>,
    pub failure: Option<ComparisonFailure>,
    pub load_error: Option<String>,
    pub divergences: Vec<DivergenceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DivergenceSummary {
    pub field: String,
    pub max_relative_error: f64,
    pub max_absolute_error: f64,
    pub mismatch_count: usize,
    pub tolerance: f64,
}

impl PairReport {
    fn from_outcome(baseline: &Path, actual: &Path, outcome: &ComparisonOutcome) -> Self {
        Self {
            baseline_path: normalize_path(baseline),
            actual_path: normalize_path(actual),
            passed: outcome.is_match(),
            verdict: Some(outcome.verdict()),
            failure: outcome.failure.clone(),
            load_error: None,
            divergences: outcome
                .divergences()
                .map(|divergence| DivergenceSummary {
                    field: divergence.field.clone(),
                    max_relative_error: divergence.max_relative_error(),
                    max_absolute_error: divergence.max_absolute_error(),
                    mismatch_count: divergence.mismatch_count(),
                    tolerance: divergence.tolerance,
                })
                .collect(),
        }
    }

    fn load_failure(baseline: &Path, actual: &Path, error: &ZeusDiffError) -> Self {
        Self {
            baseline_path: normalize_path(baseline),
            actual_path: normalize_path(actual),
            passed: false,
            verdict: None,
            failure: None,
            load_error: Some(error.to_string()),
            divergences: Vec::new(),
        }
    }
}

/// Builds a dataset comparator, checking up front that the policy covers
/// every field it decides.
pub fn comparator_for(
    options: CompareOptions,
    policy_path: Option<&Path>,
) -> ZeusDiffResult<DatasetComparator> {
    let policy = match policy_path {
        Some(path) => EqualityPolicy::from_policy_path(path, options.rtol)?,
        None => EqualityPolicy::with_rtol(options.rtol),
    };
    policy.ensure_covers(policy_fields())?;
    Ok(DatasetComparator::new(options).with_policy(policy))
}

/// Loads and compares one file pair, writing its diagnostics to `out`.
pub fn compare_pair(
    comparator: &DatasetComparator,
    baseline: &Path,
    actual: &Path,
    skip: &SkipSet,
    out: &mut impl Write,
) -> ZeusDiffResult<PairReport> {
    writeln!(out, "Comparing {} with {}", baseline.display(), actual.display())
        .map_err(output_error)?;

    let loaded = load_dataset(baseline)
        .and_then(|left| Ok((left, load_dataset(actual)?)))
        .map_err(ZeusDiffError::from);
    let (left, right) = match loaded {
        Ok(pair) => pair,
        Err(error) => {
            warn!(
                baseline = %baseline.display(),
                actual = %actual.display(),
                %error,
                "pair not loaded"
            );
            writeln!(out, "  Cannot compare files: {}", error.message()).map_err(output_error)?;
            return Ok(PairReport::load_failure(baseline, actual, &error));
        }
    };

    let outcome = comparator.compare(&left, &right)?;
    render_outcome(&outcome, comparator.options(), skip, out).map_err(output_error)?;
    info!(
        baseline = %baseline.display(),
        verdict = outcome.verdict().as_str(),
        "pair compared"
    );
    Ok(PairReport::from_outcome(baseline, actual, &outcome))
}

/// Compares two output series pairwise, in file-name order.
///
/// A pair that fails to load or differs never stops the remaining pairs.
/// Only setup problems (policy, directories, report file) and diagnostic
/// write failures are returned as errors.
pub fn compare_output(
    config: &CollectionConfig,
    out: &mut impl Write,
) -> ZeusDiffResult<CollectionReport> {
    let comparator = comparator_for(config.options, config.policy_path.as_deref())?;
    let baseline = OutputSeries::discover(&config.baseline_dir, &config.file_pattern)?;
    let actual = OutputSeries::discover(&config.actual_dir, &config.file_pattern)?;

    let paired = baseline.len().min(actual.len());
    let unmatched_files: Vec<String> = baseline.files[paired..]
        .iter()
        .chain(&actual.files[paired..])
        .map(|path| normalize_path(path))
        .collect();
    for file in &unmatched_files {
        warn!(file = file.as_str(), "no counterpart in the other series, skipping");
    }

    let mut pairs = Vec::with_capacity(paired);
    for (left, right) in baseline.files.iter().zip(&actual.files) {
        pairs.push(compare_pair(&comparator, left, right, &config.skip, out)?);
    }

    let pair_count = pairs.len();
    let matched_pair_count = pairs.iter().filter(|pair| pair.passed).count();
    let failed_pair_count = pair_count.saturating_sub(matched_pair_count);

    let report = CollectionReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: failed_pair_count == 0,
        baseline_dir: normalize_path(&config.baseline_dir),
        actual_dir: normalize_path(&config.actual_dir),
        file_pattern: config.file_pattern.clone(),
        options: config.options,
        pair_count,
        matched_pair_count,
        failed_pair_count,
        unmatched_files,
        pairs,
    };

    if let Some(report_path) = &config.report_path {
        write_report(report_path, &report)?;
    }
    Ok(report)
}

pub fn render_human_summary(report: &CollectionReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Comparison status: {}", status));
    lines.push(format!(
        "Pairs: {} total ({} matched, {} failed)",
        report.pair_count, report.matched_pair_count, report.failed_pair_count
    ));
    if !report.unmatched_files.is_empty() {
        lines.push(format!(
            "Unmatched files: {}",
            report.unmatched_files.join(", ")
        ));
    }

    for pair in report.pairs.iter().filter(|pair| !pair.passed) {
        let reason = match (&pair.failure, &pair.load_error) {
            (Some(failure), _) => failure.to_string(),
            (None, Some(load_error)) => load_error.clone(),
            (None, None) => {
                let fields: Vec<&str> = pair
                    .divergences
                    .iter()
                    .map(|divergence| divergence.field.as_str())
                    .collect();
                format!("{} differ", fields.join(", "))
            }
        };
        lines.push(format!("  {}: {}", pair.actual_path, reason));
    }

    lines.join("\n")
}

pub fn write_report(report_path: &Path, report: &CollectionReport) -> ZeusDiffResult<()> {
    if let Some(parent_dir) = report_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent_dir).map_err(|source| {
            ZeusDiffError::io_system(
                "IO.REPORT_DIRECTORY",
                format!(
                    "failed to create report directory '{}': {}",
                    parent_dir.display(),
                    source
                ),
            )
        })?;
    }

    let report_json = serde_json::to_string_pretty(report).map_err(|source| {
        ZeusDiffError::internal(
            "SYS.REPORT_SERIALIZE",
            format!(
                "failed to serialize report '{}': {}",
                report_path.display(),
                source
            ),
        )
    })?;
    fs::write(report_path, report_json).map_err(|source| {
        ZeusDiffError::io_system(
            "IO.REPORT_WRITE",
            format!(
                "failed to write report '{}': {}",
                report_path.display(),
                source
            ),
        )
    })
}

fn output_error(source: std::io::Error) -> ZeusDiffError {
    ZeusDiffError::io_system(
        "IO.OUTPUT_WRITE",
        format!("failed to write comparison output: {source}"),
    )
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

use super::CliError;
use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use zeusdiff_core::compare::{CompareOptions, DEFAULT_RTOL, SkipSet};
use zeusdiff_core::io::series::DEFAULT_FILE_PATTERN;
use zeusdiff_core::regression::{
    CollectionConfig, compare_output, compare_pair, comparator_for, render_human_summary,
};

#[derive(clap::Args)]
pub(super) struct ComparisonFlags {
    /// Relative tolerance for tolerant fields
    #[arg(long, default_value_t = DEFAULT_RTOL)]
    rtol: f64,

    /// Record kinematic and physical divergences instead of stopping at the first one
    #[arg(long)]
    keep_going: bool,

    /// Print one summary line per divergent field, without per-cell detail
    #[arg(long)]
    summary_only: bool,

    /// Compare even when the time stamps differ
    #[arg(long)]
    force: bool,

    /// i indices left out of per-cell output (comma separated)
    #[arg(long, value_delimiter = ',')]
    skip_i: Vec<usize>,

    /// j indices left out of per-cell output (comma separated)
    #[arg(long, value_delimiter = ',')]
    skip_j: Vec<usize>,

    /// k indices left out of per-cell output (comma separated)
    #[arg(long, value_delimiter = ',')]
    skip_k: Vec<usize>,

    /// Equality policy JSON; defaults to the built-in field table
    #[arg(long)]
    policy: Option<PathBuf>,
}

impl ComparisonFlags {
    fn options(&self) -> CompareOptions {
        CompareOptions {
            rtol: self.rtol,
            unforgiving: !self.keep_going,
            verbose: !self.summary_only,
            force: self.force,
        }
    }

    fn skip(&self) -> SkipSet {
        SkipSet::new(
            self.skip_i.iter().copied(),
            self.skip_j.iter().copied(),
            self.skip_k.iter().copied(),
        )
    }

    fn validate(&self) -> Result<(), CliError> {
        if !self.rtol.is_finite() || self.rtol < 0.0 {
            return Err(CliError::Usage(format!(
                "Invalid relative tolerance '{}'; expected a non-negative number.",
                self.rtol
            )));
        }
        Ok(())
    }
}

#[derive(clap::Args)]
pub(super) struct CompareArgs {
    /// Directory holding the reference dumps
    baseline_dir: PathBuf,

    /// Directory holding the dumps under test
    actual_dir: PathBuf,

    /// File name pattern of the dumps in both directories
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(flatten)]
    comparison: ComparisonFlags,
}

#[derive(clap::Args)]
pub(super) struct CompareFilesArgs {
    /// Reference dump file
    baseline: PathBuf,

    /// Dump file under test
    actual: PathBuf,

    #[command(flatten)]
    comparison: ComparisonFlags,
}

impl CompareArgs {
    fn into_config(self) -> CollectionConfig {
        CollectionConfig {
            options: self.comparison.options(),
            skip: self.comparison.skip(),
            policy_path: self.comparison.policy,
            baseline_dir: self.baseline_dir,
            actual_dir: self.actual_dir,
            file_pattern: self.pattern,
            report_path: self.report,
        }
    }
}

pub(super) fn run_compare_command(args: CompareArgs) -> Result<i32, CliError> {
    args.comparison.validate()?;
    let config = args.into_config();
    debug!(
        baseline = %config.baseline_dir.display(),
        actual = %config.actual_dir.display(),
        pattern = config.file_pattern.as_str(),
        "comparing output series"
    );

    let mut stdout = std::io::stdout().lock();
    let report = compare_output(&config, &mut stdout).map_err(CliError::Compute)?;
    writeln!(stdout, "{}", render_human_summary(&report))
        .context("failed to write comparison summary")?;
    if let Some(report_path) = &config.report_path {
        writeln!(stdout, "JSON report: {}", report_path.display())
            .context("failed to write comparison summary")?;
    }

    if report.passed { Ok(0) } else { Ok(1) }
}

pub(super) fn run_compare_files_command(args: CompareFilesArgs) -> Result<i32, CliError> {
    args.comparison.validate()?;
    debug!(
        baseline = %args.baseline.display(),
        actual = %args.actual.display(),
        "comparing dump pair"
    );
    let comparator = comparator_for(args.comparison.options(), args.comparison.policy.as_deref())
        .map_err(CliError::Compute)?;

    let mut stdout = std::io::stdout().lock();
    let pair = compare_pair(
        &comparator,
        &args.baseline,
        &args.actual,
        &args.comparison.skip(),
        &mut stdout,
    )
    .map_err(CliError::Compute)?;

    if pair.passed { Ok(0) } else { Ok(1) }
}

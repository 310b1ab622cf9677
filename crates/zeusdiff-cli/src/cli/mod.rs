mod commands;

use clap::Parser;
use zeusdiff_core::domain::ZeusDiffError;

pub fn run_from_env() -> i32 {
    match parse_and_dispatch(std::env::args().collect()) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_zeusdiff_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

#[cfg(test)]
fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("zeusdiff".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "zeusdiff",
    version,
    about = "Field-by-field comparison of simulation output dumps"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Compare two output directories dump by dump
    Compare(commands::CompareArgs),
    /// Compare a single pair of dump files
    CompareFiles(commands::CompareFilesArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Compare(args) => commands::run_compare_command(args),
        CliCommand::CompareFiles(args) => commands::run_compare_files_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ZeusDiffError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_zeusdiff_error(&self) -> ZeusDiffError {
        match self {
            Self::Usage(message) => {
                ZeusDiffError::input_validation("INPUT.CLI_USAGE", message.trim_end().to_string())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ZeusDiffError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["frobnicate"]).expect_err("subcommand does not exist");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.as_zeusdiff_error().exit_code(), 2);
    }

    #[test]
    fn malformed_skip_list_is_a_usage_error() {
        let error = run(["compare-files", "a", "b", "--skip-i", "1,x"])
            .expect_err("skip indices must be integers");
        assert!(matches!(error, CliError::Usage(_)));
    }

    #[test]
    fn unreadable_pair_is_a_failed_comparison_not_an_error() {
        let temp = tempfile::TempDir::new().expect("tempdir should be created");
        let missing = temp.path().join("absent");
        let missing = missing.to_string_lossy().to_string();

        let code = run(["compare-files", missing.as_str(), missing.as_str()])
            .expect("a pair that fails to load is reported, not raised");
        assert_eq!(code, 1);
    }
}

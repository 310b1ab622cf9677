use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write_dump(path: &Path, time: f64, density: &[f64; 4]) {
    let axis = json!({"shape": [2], "data": [0.0, 1.0]});
    let grid = |data: &[f64]| json!({"shape": [1, 2, 2], "data": data});
    let dump = json!({
        "datasets": {
            "   time": {"shape": [1], "data": [time]},
            "i coord": axis,
            "j coord": axis,
            "k coord": {"shape": [1], "data": [0.0]},
            " i velocity": grid(&[0.1; 4]),
            " j velocity": grid(&[0.2; 4]),
            " k velocity": grid(&[0.3; 4]),
            " gas energy": grid(&[1.0; 4]),
            "gas density": grid(density),
            "g potential": grid(&[-2.0; 4]),
        }
    });

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture directory should be created");
    }
    fs::write(path, dump.to_string()).expect("fixture dump should be written");
}

fn run_zeusdiff(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zeusdiff"))
        .args(args)
        .output()
        .expect("zeusdiff should start")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn compare_command_passes_for_identical_series() {
    let temp = TempDir::new().expect("tempdir should be created");
    let baseline = temp.path().join("baseline");
    let actual = temp.path().join("actual");
    for (index, time) in [0.0, 0.5].into_iter().enumerate() {
        let name = format!("hdfaa.{index:03}");
        write_dump(&baseline.join(&name), time, &[1.0, 2.0, 3.0, 4.0]);
        write_dump(&actual.join(&name), time, &[1.0, 2.0, 3.0, 4.0]);
    }
    let report = temp.path().join("out/report.json");

    let output = run_zeusdiff(&[
        "compare",
        &path_arg(&baseline),
        &path_arg(&actual),
        "--report",
        &path_arg(&report),
    ]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Comparing ").count(), 2);
    assert!(stdout.contains("Comparison status: PASS"));
    assert!(stdout.contains("JSON report: "));

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report should exist"))
            .expect("report should be JSON");
    assert_eq!(parsed["pair_count"], 2);
    assert_eq!(parsed["pairs"][0]["verdict"], "match");
}

#[test]
fn compare_files_reports_divergent_cells_and_exits_one() {
    let temp = TempDir::new().expect("tempdir should be created");
    let first = temp.path().join("hdfaa.000");
    let second = temp.path().join("other.000");
    write_dump(&first, 0.0, &[1.0, 2.0, 3.0, 4.0]);
    write_dump(&second, 0.0, &[1.0, 2.0, 3.0, 5.0]);

    let output = run_zeusdiff(&["compare-files", &path_arg(&first), &path_arg(&second)]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "unexpected output:\n{stdout}");
    assert!(lines[0].starts_with("Comparing "));
    assert_eq!(lines[1], "  Files do not match: d differs (max = 1.11E-01) ");
    assert_eq!(
        lines[2],
        "    Does not match at (   1,   1,   0)  |  diff = (1.11E-01, 1.00E+00)"
    );
}

#[test]
fn keep_going_with_summary_only_lists_each_divergent_field() {
    let temp = TempDir::new().expect("tempdir should be created");
    let first = temp.path().join("a");
    let second = temp.path().join("b");
    write_dump(&first, 0.0, &[1.0, 2.0, 3.0, 4.0]);
    write_dump(&second, 0.0, &[1.0, 2.0, 3.0, 5.0]);

    let output = run_zeusdiff(&[
        "compare-files",
        &path_arg(&first),
        &path_arg(&second),
        "--keep-going",
        "--summary-only",
        "--skip-i",
        "1",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  Files do not match: d differs (max = 1.11E-01) \n"));
    assert!(!stdout.contains("Does not match at"));
}

#[test]
fn time_mismatch_is_reported_unless_forced() {
    let temp = TempDir::new().expect("tempdir should be created");
    let first = temp.path().join("a");
    let second = temp.path().join("b");
    write_dump(&first, 1.0, &[1.0; 4]);
    write_dump(&second, 2.0, &[1.0; 4]);

    let output = run_zeusdiff(&["compare-files", &path_arg(&first), &path_arg(&second)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains(
        "  Cannot compare files: t differs [1.000000000000E+00 != 2.000000000000E+00]"
    ));

    let forced = run_zeusdiff(&[
        "compare-files",
        &path_arg(&first),
        &path_arg(&second),
        "--force",
    ]);
    assert_eq!(forced.status.code(), Some(0));
}

#[test]
fn invalid_policy_exits_with_input_validation_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    let policy = temp.path().join("policy.json");
    fs::write(&policy, r#"{"categories": [], "strict": true}"#).expect("policy written");

    let output = run_zeusdiff(&[
        "compare",
        &path_arg(temp.path()),
        &path_arg(temp.path()),
        "--policy",
        &path_arg(&policy),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.POLICY]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"));
}

#[test]
fn missing_directory_exits_with_io_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("absent");

    let output = run_zeusdiff(&["compare", &path_arg(&missing), &path_arg(temp.path())]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[IO.SERIES_DIRECTORY]"));
}

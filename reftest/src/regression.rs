//! Regression driver
//!
//! Feeds each matched exposure, together with the candidate reference file,
//! to an external calibration runner and collects pass/fail rows.

use rayon::prelude::*;
use reftest_common::config::RunnerConfig;
use reftest_common::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Placeholder replaced by the reference file path
pub const REFERENCE_PLACEHOLDER: &str = "{reference}";

/// Placeholder replaced by the exposure file path
pub const DATA_PLACEHOLDER: &str = "{data}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// Result of one calibration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub status: TestStatus,
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn passed() -> Self {
        Self {
            status: TestStatus::Passed,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// One row of a regression report
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub path: String,
    pub filename: String,
    pub status: TestStatus,
    pub error: Option<String>,
}

/// External calibration process
pub trait CalibrationRunner: Send + Sync {
    /// Calibrate `data` using `reference`
    fn run(&self, reference: &Path, data: &Path) -> TestOutcome;
}

/// Runs a configured program once per exposure
///
/// A zero exit status passes; anything else fails with the program's stderr.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let args = if args.is_empty() {
            vec![REFERENCE_PLACEHOLDER.to_string(), DATA_PLACEHOLDER.to_string()]
        } else {
            args
        };
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Arguments with placeholders substituted
    pub fn arguments(&self, reference: &Path, data: &Path) -> Vec<String> {
        let reference = reference.display().to_string();
        let data = data.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(REFERENCE_PLACEHOLDER, &reference)
                    .replace(DATA_PLACEHOLDER, &data)
            })
            .collect()
    }
}

impl CalibrationRunner for CommandRunner {
    fn run(&self, reference: &Path, data: &Path) -> TestOutcome {
        let output = match Command::new(&self.program)
            .args(self.arguments(reference, data))
            .output()
        {
            Ok(output) => output,
            Err(e) => return TestOutcome::failed(format!("Cannot start {}: {}", self.program, e)),
        };

        if output.status.success() {
            TestOutcome::passed()
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let error = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            TestOutcome::failed(error)
        }
    }
}

/// Run `reference` against every data file on `workers` threads (0 = one per core)
///
/// Blocking; rows come back in `data_files` order.
pub fn run_regression<R: CalibrationRunner>(
    runner: &R,
    reference: &Path,
    data_files: &[PathBuf],
    workers: usize,
) -> Result<Vec<TestResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Internal(format!("Cannot build worker pool: {}", e)))?;

    info!(
        reference = %reference.display(),
        "Testing against {} exposures",
        data_files.len()
    );

    let results: Vec<TestResult> = pool.install(|| {
        data_files
            .par_iter()
            .map(|data| {
                let outcome = runner.run(reference, data);
                if let Some(error) = &outcome.error {
                    warn!(file = %data.display(), "Calibration failed: {}", error);
                }
                TestResult {
                    path: data
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    filename: data
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    status: outcome.status,
                    error: outcome.error,
                }
            })
            .collect()
    });

    let passed = results.iter().filter(|r| r.status == TestStatus::Passed).count();
    info!("{}/{} exposures passed", passed, results.len());

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailOdd;

    impl CalibrationRunner for FailOdd {
        fn run(&self, _reference: &Path, data: &Path) -> TestOutcome {
            if data.to_string_lossy().contains("odd") {
                TestOutcome::failed("bad pixels")
            } else {
                TestOutcome::passed()
            }
        }
    }

    #[test]
    fn test_arguments_substitute_placeholders() {
        let runner = CommandRunner::new("calwebb", vec!["--ref={reference}".into(), "{data}".into()]);
        let args = runner.arguments(Path::new("/ref/dark.fits"), Path::new("/data/a_uncal.fits"));
        assert_eq!(args, vec!["--ref=/ref/dark.fits", "/data/a_uncal.fits"]);
    }

    #[test]
    fn test_default_arguments() {
        let runner = CommandRunner::new("calwebb", Vec::new());
        let args = runner.arguments(Path::new("r.fits"), Path::new("d.fits"));
        assert_eq!(args, vec!["r.fits", "d.fits"]);
    }

    #[test]
    fn test_run_regression_preserves_order() {
        let files = vec![
            PathBuf::from("/data/even_uncal.fits"),
            PathBuf::from("/data/odd_uncal.fits"),
        ];
        let results = run_regression(&FailOdd, Path::new("/ref/dark.fits"), &files, 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].filename, "even_uncal.fits");
        assert_eq!(results[0].status, TestStatus::Passed);
        assert_eq!(results[1].status, TestStatus::Failed);
        assert_eq!(results[1].error.as_deref(), Some("bad pixels"));
        assert_eq!(results[1].path, "/data");
    }

    #[test]
    fn test_result_serializes_to_json() {
        let row = TestResult {
            path: "/data".into(),
            filename: "a_uncal.fits".into(),
            status: TestStatus::Failed,
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_missing_program_fails() {
        let runner = CommandRunner::new("/nonexistent/calibrate", Vec::new());
        let outcome = runner.run(Path::new("r.fits"), Path::new("d.fits"));
        assert_eq!(outcome.status, TestStatus::Failed);
    }
}

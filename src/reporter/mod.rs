//! Reporter: the product's own UI — streamed per-test results and a final
//! summary. Distinct from `tracing` logging, which is for operators.
use colored::Colorize;

use crate::handler::{TestResult, TestStatus};

/// Aggregate counts across a run, used for the final summary line and the
/// exit code.
#[derive(Debug, Clone, Copy, Default)]
pub struct Summary {
    pub pass: u32,
    pub fail: u32,
    pub skip: u32,
    pub timeout: u32,
    pub error: u32,
    pub crash: u32,
}

impl Summary {
    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Pass => self.pass += 1,
            TestStatus::Fail => self.fail += 1,
            TestStatus::Skip => self.skip += 1,
            TestStatus::Timeout => self.timeout += 1,
            TestStatus::Error => self.error += 1,
            TestStatus::Crash => self.crash += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pass + self.fail + self.skip + self.timeout + self.error + self.crash
    }

    /// 0 if nothing failed, errored, timed out, or crashed; 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.fail + self.timeout + self.error + self.crash == 0 {
            0
        } else {
            1
        }
    }
}

/// Sink for streamed per-test results and the final run summary.
pub trait Reporter {
    fn on_result(&mut self, result: &TestResult);
    fn on_summary(&mut self, summary: &Summary);
}

/// One colored line per test: `PASS name (12ms)`.
#[derive(Default)]
pub struct SimpleReporter {
    use_color: bool,
}

impl SimpleReporter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }
}

impl Reporter for SimpleReporter {
    fn on_result(&mut self, result: &TestResult) {
        let label = status_label(result.status);
        let line = format!(
            "{label} {} ({}ms)",
            result.test_path.display(),
            result.duration_ms
        );
        if self.use_color {
            println!("{}", color_for(result.status, &line));
        } else {
            println!("{line}");
        }
    }

    fn on_summary(&mut self, summary: &Summary) {
        println!(
            "{} passed, {} failed, {} skipped, {} timed out, {} errored, {} crashed ({} total)",
            summary.pass,
            summary.fail,
            summary.skip,
            summary.timeout,
            summary.error,
            summary.crash,
            summary.total()
        );
    }
}

/// Like [`SimpleReporter`] but includes captured stdout/stderr on failure.
#[derive(Default)]
pub struct DetailedReporter {
    use_color: bool,
}

impl DetailedReporter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }
}

impl Reporter for DetailedReporter {
    fn on_result(&mut self, result: &TestResult) {
        let label = status_label(result.status);
        let line = format!(
            "{label} {} ({}ms)",
            result.test_path.display(),
            result.duration_ms
        );
        if self.use_color {
            println!("{}", color_for(result.status, &line));
        } else {
            println!("{line}");
        }

        if result.status != TestStatus::Pass {
            if !result.stdout.is_empty() {
                println!("  stdout: {}", result.stdout.trim());
            }
            if !result.stderr.is_empty() {
                println!("  stderr: {}", result.stderr.trim());
            }
            if let Some(msg) = &result.error_message {
                println!("  error: {msg}");
            }
        }
    }

    fn on_summary(&mut self, summary: &Summary) {
        println!(
            "{} passed, {} failed, {} skipped, {} timed out, {} errored, {} crashed ({} total)",
            summary.pass,
            summary.fail,
            summary.skip,
            summary.timeout,
            summary.error,
            summary.crash,
            summary.total()
        );
    }
}

/// Newline-delimited JSON events, for machine consumption.
#[derive(Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn on_result(&mut self, result: &TestResult) {
        match serde_json::to_string(result) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("{{\"error\":\"failed to serialize result: {e}\"}}"),
        }
    }

    fn on_summary(&mut self, summary: &Summary) {
        println!(
            "{{\"pass\":{},\"fail\":{},\"skip\":{},\"timeout\":{},\"error\":{},\"crash\":{}}}",
            summary.pass, summary.fail, summary.skip, summary.timeout, summary.error, summary.crash
        );
    }
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "PASS",
        TestStatus::Fail => "FAIL",
        TestStatus::Skip => "SKIP",
        TestStatus::Timeout => "TIMEOUT",
        TestStatus::Error => "ERROR",
        TestStatus::Crash => "CRASH",
    }
}

fn color_for(status: TestStatus, line: &str) -> String {
    match status {
        TestStatus::Pass => line.green().to_string(),
        TestStatus::Fail | TestStatus::Crash => line.red().to_string(),
        TestStatus::Skip => line.yellow().to_string(),
        TestStatus::Timeout | TestStatus::Error => line.red().bold().to_string(),
    }
}

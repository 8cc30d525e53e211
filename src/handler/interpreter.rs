//! Minimal interpreter-shim handlers for JavaScript/TypeScript, Python, Go,
//! and Ejscript. These satisfy the [`super::TestHandler`] contract without
//! reproducing each language's own toolchain semantics.
use std::time::Instant;

use which::which;

use crate::artifact::Artifact;
use crate::discovery::TestFile;
use crate::platform::process::{self, SpawnOptions};

use super::{scan_assertion_counts, HandlerContext, TestHandler, TestResult, TestStatus};

/// How to invoke the interpreter for a source file: the program name (one of
/// several candidates tried in order) and any args that must precede the
/// source path.
pub struct InterpreterHandler {
    candidates: &'static [&'static str],
    prefix_args: &'static [&'static str],
}

impl InterpreterHandler {
    pub fn javascript() -> Self {
        Self { candidates: &["node", "deno"], prefix_args: &[] }
    }

    pub fn python() -> Self {
        Self { candidates: &["python3", "python"], prefix_args: &[] }
    }

    pub fn go() -> Self {
        Self { candidates: &["go"], prefix_args: &["run"] }
    }

    pub fn ejscript() -> Self {
        Self { candidates: &["ejsvm", "ejs"], prefix_args: &[] }
    }

    fn resolve_program(&self) -> Option<&'static str> {
        self.candidates.iter().copied().find(|c| which(c).is_ok())
    }
}

impl TestHandler for InterpreterHandler {
    fn execute(&mut self, file: &TestFile, _artifact: &Artifact, ctx: &HandlerContext) -> TestResult {
        let start = Instant::now();

        let Some(program) = self.resolve_program() else {
            return TestResult {
                test_path: file.path.clone(),
                status: TestStatus::Error,
                exit_code: None,
                duration_ms: start.elapsed().as_millis() as u64,
                stdout: String::new(),
                stderr: String::new(),
                assertion_counts: None,
                error_message: Some(format!(
                    "none of {:?} found on PATH for {}",
                    self.candidates,
                    file.path.display()
                )),
            };
        };

        let mut args: Vec<String> = self.prefix_args.iter().map(|s| s.to_string()).collect();
        args.push(file.path.display().to_string());

        let opts = SpawnOptions {
            cwd: Some(file.directory.clone()),
            env: ctx.env.clone(),
            capture_output: true,
        };

        let mut child = match process::spawn(program, &args, &opts) {
            Ok(c) => c,
            Err(e) => {
                return TestResult {
                    test_path: file.path.clone(),
                    status: TestStatus::Error,
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    stdout: String::new(),
                    stderr: String::new(),
                    assertion_counts: None,
                    error_message: Some(e.to_string()),
                };
            }
        };

        let deadline = Instant::now() + ctx.timeout;
        loop {
            if let Ok(Some(_)) = child.try_wait() {
                break;
            }
            if Instant::now() >= deadline {
                let pid = child.id();
                process::kill_process(pid, true, 5_000);
                return TestResult {
                    test_path: file.path.clone(),
                    status: TestStatus::Timeout,
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    stdout: String::new(),
                    stderr: String::new(),
                    assertion_counts: None,
                    error_message: Some(format!("exceeded {}ms timeout", ctx.timeout.as_millis())),
                };
            }
            std::thread::sleep(std::time::Duration::from_millis(25));
        }

        let output = match child.wait_with_output() {
            Ok(o) => o,
            Err(e) => {
                return TestResult {
                    test_path: file.path.clone(),
                    status: TestStatus::Crash,
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    stdout: String::new(),
                    stderr: String::new(),
                    assertion_counts: None,
                    error_message: Some(e.to_string()),
                };
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let status = if output.status.success() { TestStatus::Pass } else { TestStatus::Fail };

        TestResult {
            test_path: file.path.clone(),
            status,
            exit_code: output.status.code(),
            duration_ms,
            assertion_counts: scan_assertion_counts(&stdout),
            stdout,
            stderr,
            error_message: None,
        }
    }
}

//! C handler: compile under the artifact directory, then execute the
//! resulting binary from the test's own directory.
use std::time::Instant;

use crate::artifact::Artifact;
use crate::compiler;
use crate::discovery::TestFile;
use crate::platform::process::{self, SpawnOptions};

use super::{scan_assertion_counts, HandlerContext, TestHandler, TestResult, TestStatus};

#[derive(Debug, Default)]
pub struct CHandler;

impl TestHandler for CHandler {
    fn execute(&mut self, file: &TestFile, artifact: &Artifact, ctx: &HandlerContext) -> TestResult {
        let start = Instant::now();

        let Some(toolchain) = ctx.platform.best_compiler() else {
            return TestResult {
                test_path: file.path.clone(),
                status: TestStatus::Error,
                exit_code: None,
                duration_ms: start.elapsed().as_millis() as u64,
                stdout: String::new(),
                stderr: String::new(),
                assertion_counts: None,
                error_message: Some("no C compiler found on PATH".to_string()),
            };
        };

        let output_base = artifact.dir.join(&file.stem);
        let compile_outcome = compiler::compile(
            &file.path,
            &output_base,
            &ctx.config.compiler.c,
            toolchain,
            &artifact.dir,
        );

        let outcome = match compile_outcome {
            Ok(o) => o,
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

        if !outcome.success {
            return TestResult {
                test_path: file.path.clone(),
                status: TestStatus::Error,
                exit_code: None,
                duration_ms: start.elapsed().as_millis() as u64,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                assertion_counts: None,
                error_message: Some("compilation failed".to_string()),
            };
        }

        run_binary(&outcome.output_path, file, ctx, start)
    }
}

fn run_binary(
    binary: &std::path::Path,
    file: &TestFile,
    ctx: &HandlerContext,
    start: Instant,
) -> TestResult {
    let opts = SpawnOptions {
        cwd: Some(file.directory.clone()),
        env: ctx.env.clone(),
        capture_output: true,
    };

    let mut child = match process::spawn(&binary.display().to_string(), &[], &opts) {
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
    let status = match output.status.code() {
        Some(0) => TestStatus::Pass,
        Some(_) => TestStatus::Fail,
        None => TestStatus::Crash,
    };

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

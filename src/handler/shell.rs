//! Shell/PowerShell/Batch handler: a thin wrapper over
//! [`crate::platform::shell::select_shell`] and [`crate::platform::process::spawn`].
use std::time::Instant;

use crate::artifact::Artifact;
use crate::discovery::TestFile;
use crate::platform::process::{self, SpawnOptions};
use crate::platform::shell;

use super::{scan_assertion_counts, HandlerContext, TestHandler, TestResult, TestStatus};

#[derive(Debug, Default)]
pub struct ShellHandler;

impl TestHandler for ShellHandler {
    fn execute(&mut self, file: &TestFile, _artifact: &Artifact, ctx: &HandlerContext) -> TestResult {
        let invocation = shell::select_shell(&file.path, ctx.platform);
        let opts = SpawnOptions {
            cwd: Some(file.directory.clone()),
            env: ctx.env.clone(),
            capture_output: true,
        };

        let start = Instant::now();
        let child = process::spawn(&invocation.program, &invocation.args, &opts);

        let mut child = match child {
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

        match wait_with_timeout(&mut child, ctx.timeout) {
            Some(output) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let status = if output.status.success() {
                    TestStatus::Pass
                } else {
                    TestStatus::Fail
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
            None => {
                let pid = child.id();
                process::kill_process(pid, true, 5_000);
                TestResult {
                    test_path: file.path.clone(),
                    status: TestStatus::Timeout,
                    exit_code: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    stdout: String::new(),
                    stderr: String::new(),
                    assertion_counts: None,
                    error_message: Some(format!("exceeded {}ms timeout", ctx.timeout.as_millis())),
                }
            }
        }
    }
}

/// Wait for `child` up to `timeout`, polling every 25ms. Returns `None` on
/// timeout (the child is left running; the caller is responsible for
/// killing it).
fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: std::time::Duration,
) -> Option<std::process::Output> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(Some(_)) = child.try_wait() {
            break;
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(std::time::Duration::from_millis(25));
    }

    // Safe to call wait_with_output-equivalent: process already exited, this
    // just collects the already-piped stdout/stderr.
    let status = child.wait().ok()?;
    use std::io::Read;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr);
    }
    Some(std::process::Output { status, stdout, stderr })
}

//! Handler registry: map a test's [`TestType`] to a fresh [`TestHandler`]
//! per test, plus shared result types.
pub mod c;
pub mod interpreter;
pub mod shell;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::artifact::Artifact;
use crate::config::schema::TestConfig;
use crate::discovery::{TestFile, TestType};
use crate::platform::PlatformContext;

/// Outcome of running a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Timeout,
    Error,
    Crash,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
            TestStatus::Timeout => "timeout",
            TestStatus::Error => "error",
            TestStatus::Crash => "crash",
        };
        write!(f, "{s}")
    }
}

/// Assertion counts scraped from a test's stdout, when any `✓`/`✗` markers
/// were found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssertionCounts {
    pub passed: u32,
    pub failed: u32,
}

/// The outcome of one test execution, as produced by a handler and streamed
/// through the scheduler to the Reporter.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test_path: PathBuf,
    pub status: TestStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
    pub assertion_counts: Option<AssertionCounts>,
    pub error_message: Option<String>,
}

/// Everything a handler needs to run a test, built once by the Scheduler.
pub struct HandlerContext<'a> {
    pub config: &'a TestConfig,
    pub env: &'a HashMap<String, String>,
    pub timeout: Duration,
    pub platform: &'a PlatformContext,
}

/// Compile-or-prepare, execute, and clean up a single test.
///
/// A fresh handler is created per test; handlers carry no state between
/// invocations.
pub trait TestHandler {
    fn prepare(&mut self, _file: &TestFile, _artifact: &Artifact, _ctx: &HandlerContext) -> crate::error::Result<()> {
        Ok(())
    }

    fn execute(&mut self, file: &TestFile, artifact: &Artifact, ctx: &HandlerContext) -> TestResult;

    fn cleanup(&mut self, _file: &TestFile, _artifact: &Artifact) {}
}

/// Construct the handler for a given [`TestType`]. Every test gets a fresh
/// instance; handlers hold no state across tests.
pub fn handler_for(test_type: TestType) -> Box<dyn TestHandler> {
    match test_type {
        TestType::C => Box::new(c::CHandler::default()),
        TestType::Shell | TestType::PowerShell | TestType::Batch => {
            Box::new(shell::ShellHandler::default())
        }
        TestType::JavaScript | TestType::TypeScript => {
            Box::new(interpreter::InterpreterHandler::javascript())
        }
        TestType::Python => Box::new(interpreter::InterpreterHandler::python()),
        TestType::Go => Box::new(interpreter::InterpreterHandler::go()),
        TestType::Ejscript => Box::new(interpreter::InterpreterHandler::ejscript()),
    }
}

/// Scan `stdout` for `✓`/`✗` markers and return counts if any were found.
pub fn scan_assertion_counts(stdout: &str) -> Option<AssertionCounts> {
    let passed = stdout.matches('✓').count() as u32;
    let failed = stdout.matches('✗').count() as u32;
    if passed == 0 && failed == 0 {
        None
    } else {
        Some(AssertionCounts { passed, failed })
    }
}

//! Scheduler/runner: drives discovery, per-group service lifecycles, and
//! bounded-parallel test execution, streaming results to a [`Reporter`].
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use tracing::{info, warn};

use crate::artifact;
use crate::config::{self, schema::TestConfig};
use crate::discovery::{self, DiscoveryFilter, TestFile};
use crate::error::TestmeError;
use crate::expand::SpecialVariables;
use crate::handler::{self, HandlerContext, TestResult, TestStatus};
use crate::platform::PlatformContext;
use crate::reporter::{Reporter, Summary};
use crate::service::{self, GroupReadiness};

/// Fully-resolved run options, as produced by the CLI layer.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub roots: Vec<PathBuf>,
    pub name_patterns: Vec<String>,
    pub depth: u32,
    pub iterations: u32,
    pub workers: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub verbose: bool,
    pub quiet: bool,
    pub keep: bool,
    pub profile: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            name_patterns: Vec::new(),
            depth: 0,
            iterations: 1,
            workers: None,
            timeout_ms: None,
            verbose: false,
            quiet: false,
            keep: false,
            profile: None,
        }
    }
}

/// Shared cancellation flag flipped by a `ctrlc` handler; observed between
/// batches and between groups so in-flight work still completes its normal
/// control-flow path (cleanup is never run from inside the signal handler).
pub type CancelFlag = Arc<AtomicBool>;

pub fn install_cancel_handler() -> CancelFlag {
    let flag: CancelFlag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    let _ = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    });
    flag
}

/// Run the whole pipeline. Returns the process exit code (0/1/130 per §6).
pub fn run(options: &RunOptions, reporter: &mut dyn Reporter, cancel: &CancelFlag) -> i32 {
    let platform = PlatformContext::new();
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    let filter = DiscoveryFilter {
        name_patterns: options.name_patterns.clone(),
        depth: options.depth,
    };

    let mut config_cache: HashMap<PathBuf, (TestConfig, Option<PathBuf>)> = HashMap::new();
    let roots = options.roots.clone();

    let files = discovery::discover(&roots, &filter, |dir| {
        let (config, config_dir) = config_cache
            .entry(dir.to_path_buf())
            .or_insert_with(|| config::load_for_dir(dir, None).unwrap_or_else(|_| (TestConfig::default(), None)))
            .clone();
        (config.enable, config.depth, config.patterns.clone())
    });

    info!(count = files.len(), "discovery complete");

    let mut groups: HashMap<Option<PathBuf>, Vec<TestFile>> = HashMap::new();
    for file in files {
        let config_dir = config_cache
            .get(&file.directory)
            .and_then(|(_, dir)| dir.clone())
            .or_else(|| config::find_config_chain(&file.directory).ok().and_then(|l| l.last().map(|l| l.dir.clone())));
        groups.entry(config_dir).or_default().push(file);
    }

    let mut summary = Summary::default();

    for (config_dir, group_files) in groups {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let base_dir = config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let (config, _) = config::load_for_dir(&base_dir, None).unwrap_or_else(|_| (TestConfig::default(), None));

        let vars = SpecialVariables::new(
            &exe_dir,
            &base_dir,
            config_dir.as_deref(),
            platform.best_compiler().map(|c| c.kind.as_str()).unwrap_or("gcc"),
            options.profile.as_deref().unwrap_or(&config.profile),
        );
        let config = config::expand_paths(&config, &base_dir, &vars);

        let effective_workers = options.workers.unwrap_or(config.execution.workers);
        if effective_workers == 0 {
            let err = TestmeError::Config {
                path: base_dir.clone(),
                message: "execution.workers must be at least 1".to_string(),
            };
            warn!(dir = %base_dir.display(), error = %err, "rejecting configuration");
            return err.exit_code();
        }

        let env = build_group_env(&config, options);

        match service::start_group(&config.services, &base_dir, &env) {
            GroupReadiness::Skipped => {
                for file in &group_files {
                    let result = skipped_result(file);
                    summary.record(result.status);
                    reporter.on_result(&result);
                }
                continue;
            }
            GroupReadiness::Failed(message) => {
                for file in &group_files {
                    let result = error_result(file, &message);
                    summary.record(result.status);
                    reporter.on_result(&result);
                }
                continue;
            }
            GroupReadiness::Ready(setup) => {
                run_group(&group_files, &config, &env, options, &platform, reporter, &mut summary, cancel);
                service::stop_group(&config.services, setup, &base_dir, &env);
            }
        }
    }

    reporter.on_summary(&summary);

    if cancel.load(Ordering::SeqCst) {
        130
    } else {
        summary.exit_code()
    }
}

fn build_group_env(config: &TestConfig, options: &RunOptions) -> HashMap<String, String> {
    let mut env = config.env.clone();
    env.insert("TESTME_VERBOSE".to_string(), bool_flag(options.verbose));
    env.insert("TESTME_QUIET".to_string(), bool_flag(options.quiet));
    env.insert("TESTME_KEEP".to_string(), bool_flag(options.keep || config.execution.keep));
    env.insert("TESTME_DEPTH".to_string(), options.depth.to_string());
    env.insert("TESTME_ITERATIONS".to_string(), options.iterations.max(1).to_string());
    env.insert(
        "TESTME_PROFILE".to_string(),
        options.profile.clone().unwrap_or_else(|| config.profile.clone()),
    );
    env
}

fn bool_flag(b: bool) -> String {
    if b { "1".to_string() } else { "0".to_string() }
}

fn skipped_result(file: &TestFile) -> TestResult {
    TestResult {
        test_path: file.path.clone(),
        status: TestStatus::Skip,
        exit_code: None,
        duration_ms: 0,
        stdout: String::new(),
        stderr: String::new(),
        assertion_counts: None,
        error_message: None,
    }
}

fn error_result(file: &TestFile, message: &str) -> TestResult {
    TestResult {
        test_path: file.path.clone(),
        status: TestStatus::Error,
        exit_code: None,
        duration_ms: 0,
        stdout: String::new(),
        stderr: String::new(),
        assertion_counts: None,
        error_message: Some(message.to_string()),
    }
}

/// Partition `files` into batches of `execution.workers` and run each batch
/// with one thread per test, streaming results to `reporter` in completion
/// order.
fn run_group(
    files: &[TestFile],
    config: &TestConfig,
    env: &HashMap<String, String>,
    options: &RunOptions,
    platform: &PlatformContext,
    reporter: &mut dyn Reporter,
    summary: &mut Summary,
    cancel: &CancelFlag,
) {
    let workers = options.workers.unwrap_or(config.execution.workers);
    let timeout = Duration::from_millis(options.timeout_ms.unwrap_or(config.execution.timeout));
    let keep = options.keep || config.execution.keep;

    // Several tests can share a `.testme` directory (one per source
    // directory, not per file), and batches run concurrently, so artifact
    // cleanup is deferred until every test in the group has finished rather
    // than run per-test.
    let mut pass_by_dir: HashMap<PathBuf, bool> = HashMap::new();

    for batch in files.chunks(workers) {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let (tx, rx) = mpsc::channel::<(PathBuf, TestResult)>();

        std::thread::scope(|scope| {
            for file in batch {
                let tx = tx.clone();
                let env = env.clone();
                let config = config.clone();
                scope.spawn(move || {
                    let ctx = HandlerContext {
                        config: &config,
                        env: &env,
                        timeout,
                        platform,
                    };
                    let result = run_one(file, &ctx);
                    let _ = tx.send((file.directory.clone(), result));
                });
            }
            drop(tx);

            for (directory, result) in rx {
                let passed = result.status == TestStatus::Pass;
                pass_by_dir
                    .entry(directory)
                    .and_modify(|p| *p = *p && passed)
                    .or_insert(passed);
                summary.record(result.status);
                reporter.on_result(&result);
            }
        });
    }

    for (directory, all_passed) in pass_by_dir {
        artifact::cleanup(&directory, all_passed, keep);
    }
}

fn run_one(file: &TestFile, ctx: &HandlerContext) -> TestResult {
    let artifact = match artifact::allocate(&file.directory, &file.stem) {
        Ok(a) => a,
        Err(e) => return error_result(file, &e.to_string()),
    };

    let mut handler = handler::handler_for(file.test_type);
    if let Err(e) = handler.prepare(file, &artifact, ctx) {
        return error_result(file, &e.to_string());
    }

    let result = handler.execute(file, &artifact, ctx);
    handler.cleanup(file, &artifact);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::SimpleReporter;

    #[test]
    fn run_with_no_tests_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            roots: vec![dir.path().to_path_buf()],
            ..RunOptions::default()
        };
        let mut reporter = SimpleReporter::new(false);
        let cancel = Arc::new(AtomicBool::new(false));
        let code = run(&options, &mut reporter, &cancel);
        assert_eq!(code, 0);
    }

    #[test]
    fn run_reports_pass_for_passing_shell_test() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("good.tst.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        crate::platform::process::make_executable(&script).unwrap();

        let options = RunOptions {
            roots: vec![dir.path().to_path_buf()],
            ..RunOptions::default()
        };
        let mut reporter = SimpleReporter::new(false);
        let cancel = Arc::new(AtomicBool::new(false));
        let code = run(&options, &mut reporter, &cancel);
        assert_eq!(code, 0);
    }

    #[test]
    fn workers_zero_in_config_is_rejected_as_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("testme.json5"), "{ execution: { workers: 0 } }").unwrap();
        let script = dir.path().join("good.tst.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        crate::platform::process::make_executable(&script).unwrap();

        let options = RunOptions {
            roots: vec![dir.path().to_path_buf()],
            ..RunOptions::default()
        };
        let mut reporter = SimpleReporter::new(false);
        let cancel = Arc::new(AtomicBool::new(false));
        let code = run(&options, &mut reporter, &cancel);
        assert_eq!(code, TestmeError::Config { path: dir.path().to_path_buf(), message: String::new() }.exit_code());
    }

    #[test]
    fn build_group_env_carries_testme_variables() {
        let config = TestConfig::default();
        let options = RunOptions { verbose: true, ..RunOptions::default() };
        let env = build_group_env(&config, &options);
        assert_eq!(env.get("TESTME_VERBOSE"), Some(&"1".to_string()));
        assert_eq!(env.get("TESTME_QUIET"), Some(&"0".to_string()));
    }
}

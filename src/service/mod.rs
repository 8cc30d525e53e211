//! Service manager: skip/prep/setup/cleanup lifecycle around a group of
//! tests that share a governing config directory.
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::schema::ServicesConfig;
use crate::platform::process::{self, SpawnOptions};

/// Outcome of running the skip/prep/setup sequence for a group.
#[derive(Debug)]
pub enum GroupReadiness {
    /// No skip configured, or skip exited 0: tests may run. Carries the
    /// handle to the long-lived setup process, if any, so it can be torn
    /// down afterwards.
    Ready(Option<SetupHandle>),
    /// Skip command exited non-zero: the whole group is skipped, not failed.
    Skipped,
    /// Prep or setup failed: every test in the group is reported as Error.
    Failed(String),
}

/// A running `setup` subprocess.
pub struct SetupHandle {
    pub pid: u32,
    child: std::process::Child,
}

impl std::fmt::Debug for SetupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupHandle").field("pid", &self.pid).finish()
    }
}

/// Run `skip` (if configured), then `prep`, then `setup`+`delay`, in
/// `work_dir` (the config directory) with `env` already expanded.
pub fn start_group(
    services: &ServicesConfig,
    work_dir: &Path,
    env: &HashMap<String, String>,
) -> GroupReadiness {
    if let Some(skip) = &services.skip {
        match run_to_completion(skip, work_dir, env, services.skip_timeout_ms()) {
            Ok(status) if status.success() => {
                debug!(work_dir = %work_dir.display(), "skip check passed");
            }
            Ok(_) => {
                info!(work_dir = %work_dir.display(), "group skipped by skip command");
                return GroupReadiness::Skipped;
            }
            Err(e) => {
                warn!(work_dir = %work_dir.display(), error = %e, "skip command failed to run");
                return GroupReadiness::Skipped;
            }
        }
    }

    if let Some(prep) = &services.prep {
        match run_to_completion(prep, work_dir, env, services.prep_timeout_ms()) {
            Ok(status) if status.success() => {
                debug!(work_dir = %work_dir.display(), "prep completed");
            }
            Ok(status) => {
                return GroupReadiness::Failed(format!(
                    "prep command exited with {status}"
                ));
            }
            Err(e) => return GroupReadiness::Failed(format!("prep command failed: {e}")),
        }
    }

    let setup_handle = match &services.setup {
        None => None,
        Some(setup) => match spawn_setup(setup, work_dir, env) {
            Ok(handle) => {
                std::thread::sleep(Duration::from_secs(1));
                if !process::is_process_running(handle.pid) {
                    return GroupReadiness::Failed(
                        "setup process exited within its first second".to_string(),
                    );
                }
                Some(handle)
            }
            Err(e) => return GroupReadiness::Failed(format!("setup command failed to spawn: {e}")),
        },
    };

    if services.delay_ms() > 0 {
        std::thread::sleep(Duration::from_millis(services.delay_ms()));
    }

    GroupReadiness::Ready(setup_handle)
}

/// Tear down a group: stop the setup process (if any), then run `cleanup`.
/// Idempotent: safe to call more than once (e.g. once from the normal
/// control-flow path and again if a cancellation flag was observed).
pub fn stop_group(
    services: &ServicesConfig,
    setup: Option<SetupHandle>,
    work_dir: &Path,
    env: &HashMap<String, String>,
) {
    if let Some(mut handle) = setup {
        process::kill_process(handle.pid, true, services.shutdown_timeout_ms());
        let _ = handle.child.wait();
    }

    if let Some(cleanup) = &services.cleanup {
        match run_to_completion(cleanup, work_dir, env, services.cleanup_timeout_ms()) {
            Ok(status) if !status.success() => {
                warn!(work_dir = %work_dir.display(), %status, "cleanup command exited non-zero");
            }
            Err(e) => warn!(work_dir = %work_dir.display(), error = %e, "cleanup command failed to run"),
            _ => {}
        }
    }
}

fn run_to_completion(
    command: &str,
    work_dir: &Path,
    env: &HashMap<String, String>,
    timeout_ms: u64,
) -> std::io::Result<std::process::ExitStatus> {
    let (program, args) = split_shell_command(command);
    let opts = SpawnOptions {
        cwd: Some(work_dir.to_path_buf()),
        env: env.clone(),
        capture_output: true,
    };
    let mut child = process::spawn(&program, &args, &opts)?;

    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let pid = child.id();
            process::kill_process(pid, true, 5_000);
            return child.wait();
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_setup(
    command: &str,
    work_dir: &Path,
    env: &HashMap<String, String>,
) -> std::io::Result<SetupHandle> {
    let (program, args) = split_shell_command(command);
    let opts = SpawnOptions {
        cwd: Some(work_dir.to_path_buf()),
        env: env.clone(),
        capture_output: false,
    };
    let child = process::spawn(&program, &args, &opts)?;
    let pid = child.id();
    Ok(SetupHandle { pid, child })
}

/// Run `command` through the platform shell, so users can write multi-word
/// shell commands (`"node server.js --port 8080"`) in config.
fn split_shell_command(command: &str) -> (String, Vec<String>) {
    if cfg!(windows) {
        ("cmd".to_string(), vec!["/C".to_string(), command.to_string()])
    } else {
        ("sh".to_string(), vec!["-c".to_string(), command.to_string()])
    }
}

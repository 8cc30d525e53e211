//! Process spawn/kill primitives.
//!
//! Every test and service subprocess goes through [`spawn`] so that PATH
//! handling and process-group placement (for tree-kill) are consistent.
use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Options governing how a subprocess is launched.
#[derive(Debug, Default, Clone)]
pub struct SpawnOptions {
    pub cwd: Option<std::path::PathBuf>,
    pub env: HashMap<String, String>,
    pub capture_output: bool,
}

/// Spawn `program args...` with the given options.
///
/// The launcher prepends `.` to `PATH` so scripts located in the working
/// directory resolve without an explicit `./` prefix, and places the child in
/// its own process group/job so the whole tree can be killed together.
pub fn spawn(program: &str, args: &[String], opts: &SpawnOptions) -> std::io::Result<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    let path = std::env::var("PATH").unwrap_or_default();
    let sep = if cfg!(windows) { ';' } else { ':' };
    cmd.env("PATH", format!(".{sep}{path}"));
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }

    if opts.capture_output {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }
    cmd.stdin(Stdio::null());

    place_in_own_group(&mut cmd);

    debug!(program, ?args, "spawning subprocess");
    cmd.spawn()
}

#[cfg(unix)]
fn place_in_own_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn place_in_own_group(_cmd: &mut Command) {
    // taskkill /T below walks the child tree by PID, no group setup needed.
}

/// Terminate `pid`, gracefully first (if `graceful`), then forcefully.
///
/// Polls liveness at 100ms intervals up to `shutdown_timeout_ms` (checked at
/// least once even when the budget is zero) before escalating to a hard
/// kill. Always kills the whole process tree rooted at `pid`.
pub fn kill_process(pid: u32, graceful: bool, shutdown_timeout_ms: u64) {
    if !is_process_running(pid) {
        return;
    }

    if graceful {
        terminate(pid);

        let deadline = Instant::now() + Duration::from_millis(shutdown_timeout_ms);
        loop {
            if !is_process_running(pid) {
                return;
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    if is_process_running(pid) {
        warn!(pid, "process did not exit gracefully, forcing kill");
        force_kill(pid);
    }
}

/// Check whether `pid` is still alive.
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(windows)]
    {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout).contains(&pid.to_string())
            })
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    // Negative pid targets the whole process group created by `process_group(0)`.
    let _ = signal::killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(unix)]
fn force_kill(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    let _ = signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(windows)]
fn terminate(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .output();
}

#[cfg(windows)]
fn force_kill(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output();
}

/// Check if a path exists and is executable, per platform semantics.
pub fn is_executable(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    #[cfg(windows)]
    {
        executable_extensions().iter().any(|ext| {
            path.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
        })
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
    }
}

/// Make `path` executable. A no-op on Windows, where executability is carried
/// by extension rather than the permission bits.
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
    }

    #[cfg(windows)]
    {
        let _ = path;
        Ok(())
    }
}

pub fn executable_extensions() -> &'static [&'static str] {
    &[".exe", ".bat", ".cmd", ".ps1", ".com", ".vbs", ".wsf", ".msi"]
}

/// `.exe` on Windows, empty string elsewhere.
pub fn binary_extension() -> &'static str {
    if cfg!(windows) { ".exe" } else { "" }
}

/// Append [`binary_extension`] to `name` unless it is already present.
pub fn add_binary_extension(name: &str) -> String {
    let ext = binary_extension();
    if ext.is_empty() || name.ends_with(ext) {
        name.to_string()
    } else {
        format!("{name}{ext}")
    }
}

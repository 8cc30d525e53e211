//! Platform layer: OS/arch detection, compiler/shell probing, process
//! spawn/kill, and executable-bit semantics.
//!
//! [`PlatformContext`] is constructed once (in `main`, or once per test in
//! the test suite) and threaded explicitly through the engine rather than
//! relying on module-level singletons — the reference implementation's
//! detector caches become fields behind a lock here.
pub mod compiler;
pub mod process;
pub mod shell;

use std::sync::OnceLock;

use compiler::CompilerInfo;

/// Host operating system.
pub fn os() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macosx"
    } else {
        "linux"
    }
}

/// Host CPU architecture, normalized to the `arm64|x64|x86` vocabulary.
pub fn arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "arm64",
        "x86_64" => "x64",
        "x86" => "x86",
        other => other,
    }
}

pub fn is_windows() -> bool {
    cfg!(target_os = "windows")
}

pub fn is_macos() -> bool {
    cfg!(target_os = "macos")
}

pub fn is_linux() -> bool {
    cfg!(target_os = "linux")
}

/// `OS-ARCH`, e.g. `linux-x64`.
pub fn platform_tag() -> String {
    format!("{}-{}", os(), arch())
}

/// Shared, lazily-populated detection results threaded through the engine.
///
/// Construct once per process (or once per test, in tests) with
/// [`PlatformContext::new`]; detection runs at most once per context.
#[derive(Debug, Default)]
pub struct PlatformContext {
    compilers: OnceLock<Vec<CompilerInfo>>,
    powershell: OnceLock<String>,
    git_bash: OnceLock<Option<String>>,
    default_shell: OnceLock<String>,
}

impl PlatformContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// All compilers found on the host, probed once and cached.
    pub fn compilers(&self) -> &[CompilerInfo] {
        self.compilers.get_or_init(compiler::enumerate_compilers)
    }

    /// The best available compiler, per platform priority (§4.1).
    pub fn best_compiler(&self) -> Option<&CompilerInfo> {
        compiler::best_compiler(self.compilers())
    }

    pub fn compiler_named(&self, kind: compiler::CompilerKind) -> Option<&CompilerInfo> {
        self.compilers().iter().find(|c| c.kind == kind)
    }

    /// The PowerShell executable to invoke for `.ps1` scripts, probed once.
    pub fn powershell(&self) -> &str {
        self.powershell.get_or_init(shell::probe_powershell)
    }

    /// A real Git Bash, if one is installed, probed once.
    pub fn git_bash(&self) -> Option<&str> {
        self.git_bash.get_or_init(shell::probe_git_bash).as_deref()
    }

    /// The default shell for extensionless scripts on Unix, probed once.
    pub fn default_shell(&self) -> &str {
        self.default_shell.get_or_init(shell::probe_default_shell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_is_one_of_the_known_three() {
        assert!(["windows", "macosx", "linux"].contains(&os()));
    }

    #[test]
    fn platform_tag_combines_os_and_arch() {
        let tag = platform_tag();
        assert!(tag.contains('-'));
        assert!(tag.starts_with(os()));
    }

    #[test]
    fn platform_context_caches_compiler_probe() {
        let ctx = PlatformContext::new();
        let first = ctx.compilers().len();
        let second = ctx.compilers().len();
        assert_eq!(first, second);
    }
}

//! Compiler abstraction: toolchain default flags, cross-dialect flag
//! translation, and invocation.
pub mod flags;

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::schema::CCompilerConfig;
use crate::error::{Result, TestmeError};
use crate::expand::normalize_rpath;
use crate::platform::compiler::{CompilerInfo, CompilerKind};

/// Result of a single compile invocation.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    pub output_path: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

/// Compile `source` into `<output_base>` (extension added per-toolchain) in
/// `work_dir`, using flags/libraries composed from `compiler` and the chosen
/// `toolchain`.
pub fn compile(
    source: &Path,
    output_base: &Path,
    compiler: &CCompilerConfig,
    toolchain: &CompilerInfo,
    work_dir: &Path,
) -> Result<CompileOutcome> {
    let output_path = if toolchain.kind == CompilerKind::Msvc {
        output_base.with_extension("exe")
    } else if cfg!(windows) {
        output_base.with_extension("exe")
    } else {
        output_base.to_path_buf()
    };

    let flags = flags::compose(compiler, toolchain.kind);
    let libraries = flags::normalize_libraries(&compiler.libraries, toolchain.kind);

    let mut cmd = match toolchain.kind {
        CompilerKind::Msvc => build_msvc_invocation(&toolchain.program, &flags, source, &output_path, &libraries),
        _ => build_unix_invocation(&toolchain.program, &flags, source, &output_path, &libraries),
    };

    cmd.current_dir(work_dir);
    for (k, v) in &toolchain.env {
        cmd.env(k, v);
    }

    let output = cmd.output().map_err(|e| TestmeError::Exec {
        source_file: source.to_path_buf(),
        source: e,
    })?;

    Ok(CompileOutcome {
        success: output.status.success(),
        output_path,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn build_unix_invocation(
    program: &Path,
    flags: &[String],
    source: &Path,
    output_path: &Path,
    libraries: &[String],
) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(flags.iter().map(|f| normalize_rpath(f)));
    cmd.arg("-o").arg(output_path);
    cmd.arg(source);
    cmd.args(libraries);
    cmd
}

fn build_msvc_invocation(
    program: &Path,
    flags: &[String],
    source: &Path,
    output_path: &Path,
    libraries: &[String],
) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(flags);
    cmd.arg(format!("/Fe:{}", output_path.display()));
    cmd.arg(source);
    cmd.arg("/link");
    if let Some(home) = dirs::home_dir() {
        cmd.arg(format!("/LIBPATH:{}", home.join(".local").join("lib").display()));
    }
    cmd.args(libraries);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn gcc() -> CompilerInfo {
        CompilerInfo {
            kind: CompilerKind::Gcc,
            program: PathBuf::from("gcc"),
            env: HashMap::new(),
        }
    }

    #[test]
    fn compile_reports_failure_for_broken_source() {
        if which::which("gcc").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.tst.c");
        std::fs::write(&source, "int main() { this is not c }").unwrap();

        let outcome = compile(
            &source,
            &dir.path().join("broken"),
            &CCompilerConfig::default(),
            &gcc(),
            dir.path(),
        )
        .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.stderr.is_empty());
    }

    #[test]
    fn compile_succeeds_for_valid_source() {
        if which::which("gcc").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ok.tst.c");
        std::fs::write(&source, "int main(void) { return 0; }").unwrap();

        let outcome = compile(
            &source,
            &dir.path().join("ok"),
            &CCompilerConfig::default(),
            &gcc(),
            dir.path(),
        )
        .unwrap();

        assert!(outcome.success);
        assert!(outcome.output_path.exists());
    }
}

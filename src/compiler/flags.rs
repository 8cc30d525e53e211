//! Toolchain default flags, flag composition, and cross-dialect translation.
use std::path::Path;

use crate::config::schema::CCompilerConfig;
use crate::platform::compiler::CompilerKind;

/// Default flags for a toolchain before any user configuration is merged in.
pub fn defaults(kind: CompilerKind) -> Vec<String> {
    let home_include = dirs::home_dir()
        .map(|h| h.join(".local").join("include").display().to_string())
        .unwrap_or_default();
    let home_lib = dirs::home_dir()
        .map(|h| h.join(".local").join("lib").display().to_string())
        .unwrap_or_default();

    match kind {
        CompilerKind::Gcc | CompilerKind::Mingw => {
            let mut v = vec![
                "-std=c99".to_string(),
                "-Wall".to_string(),
                "-Wextra".to_string(),
                "-Wno-unused-parameter".to_string(),
                "-Wno-strict-prototypes".to_string(),
                "-O0".to_string(),
                "-g".to_string(),
                "-I.".to_string(),
                format!("-I{home_include}"),
                format!("-L{home_lib}"),
            ];
            if crate::platform::is_macos() {
                v.push("-I/opt/homebrew/include".to_string());
                v.push("-L/opt/homebrew/lib".to_string());
            }
            v
        }
        CompilerKind::Clang => {
            let mut v = vec![
                "-std=c99".to_string(),
                "-Wall".to_string(),
                "-Wextra".to_string(),
                "-Wno-unused-parameter".to_string(),
                "-O0".to_string(),
                "-g".to_string(),
                "-I.".to_string(),
                format!("-I{home_include}"),
                format!("-L{home_lib}"),
            ];
            if crate::platform::is_macos() {
                v.push("-I/opt/homebrew/include".to_string());
                v.push("-L/opt/homebrew/lib".to_string());
            }
            v
        }
        CompilerKind::Msvc => vec![
            "/std:c11".to_string(),
            "/W4".to_string(),
            "/Od".to_string(),
            "/Zi".to_string(),
            "/FS".to_string(),
            "/nologo".to_string(),
            format!("/I{home_include}"),
        ],
    }
}

/// Compose the full flag set for a compile: toolchain defaults, then the
/// common `compiler.c.flags`, then the per-compiler-variant subsection,
/// translating dialect when the user's flags were written for a different
/// toolchain family.
pub fn compose(config: &CCompilerConfig, kind: CompilerKind) -> Vec<String> {
    let mut flags = defaults(kind);

    for flag in &config.flags {
        flags.push(translate(flag, kind));
    }

    let variant = match kind {
        CompilerKind::Gcc => &config.gcc,
        CompilerKind::Clang => &config.clang,
        CompilerKind::Msvc => &config.msvc,
        CompilerKind::Mingw => &config.mingw,
    };
    for flag in &variant.flags {
        flags.push(flag.clone());
    }

    flags
}

/// Translate a single flag to `target`'s dialect when it looks like it was
/// written for the other family. Unknown flags pass through unchanged.
pub fn translate(flag: &str, target: CompilerKind) -> String {
    let to_msvc = matches!(target, CompilerKind::Msvc);

    if to_msvc {
        gcc_to_msvc(flag)
    } else if flag.starts_with('/') {
        msvc_to_gcc(flag)
    } else {
        flag.to_string()
    }
}

fn gcc_to_msvc(flag: &str) -> String {
    match flag {
        "-Wall" | "-Wextra" => "/W4".to_string(),
        "-Werror" => "/WX".to_string(),
        "-std=c99" | "-std=c11" => "/std:c11".to_string(),
        "-std=c17" => "/std:c17".to_string(),
        "-O0" => "/Od".to_string(),
        "-O1" | "-O2" => "/O2".to_string(),
        "-O3" => "/Ox".to_string(),
        "-g" => "/Zi".to_string(),
        _ if flag.starts_with("-I") => format!("/I{}", &flag[2..]),
        _ if flag.starts_with("-L") => format!("/LIBPATH:{}", &flag[2..]),
        _ if flag.starts_with("-D") => format!("/D{}", &flag[2..]),
        _ => flag.to_string(),
    }
}

fn msvc_to_gcc(flag: &str) -> String {
    if let Some(rest) = flag.strip_prefix("/LIBPATH:") {
        return format!("-L{rest}");
    }
    match flag {
        "/W4" => "-Wall".to_string(),
        "/WX" => "-Werror".to_string(),
        "/std:c11" => "-std=c11".to_string(),
        "/std:c17" => "-std=c17".to_string(),
        "/Od" => "-O0".to_string(),
        "/O2" => "-O2".to_string(),
        "/Ox" => "-O3".to_string(),
        "/Zi" => "-g".to_string(),
        _ if flag.starts_with("/I") => format!("-I{}", &flag[2..]),
        _ if flag.starts_with("/D") => format!("-D{}", &flag[2..]),
        _ => flag.to_string(),
    }
}

/// Resolve relative `-I`/`-L`/`/I`/`/LIBPATH:` paths in `flags` against
/// `base_dir`, the directory of the config file that contributed them. Must
/// run before layers are merged together, since a parent's and a child's
/// flag can look identical (`-I../shared/inc`) while meaning two different
/// absolute paths. Flags still carrying `${...}` tokens are left alone;
/// those are resolved later, against the test's own directory.
pub fn resolve_relative_paths(flags: &[String], base_dir: &Path) -> Vec<String> {
    flags.iter().map(|f| resolve_one(f, base_dir)).collect()
}

fn resolve_one(flag: &str, base_dir: &Path) -> String {
    if flag.contains("${") {
        return flag.to_string();
    }
    for prefix in ["-I", "-L", "/I", "/LIBPATH:"] {
        if let Some(rest) = flag.strip_prefix(prefix) {
            if rest.is_empty() || Path::new(rest).is_absolute() {
                return flag.to_string();
            }
            return format!("{prefix}{}", base_dir.join(rest).display());
        }
    }
    flag.to_string()
}

/// Normalize a bare library name to the invocation syntax a toolchain
/// expects: `foo`/`libfoo` -> `-lfoo` (Unix) or `foo.lib` (MSVC); `-lfoo`
/// and `foo.lib` pass through unchanged.
pub fn normalize_libraries(libraries: &[String], kind: CompilerKind) -> Vec<String> {
    libraries.iter().map(|lib| normalize_library(lib, kind)).collect()
}

fn normalize_library(lib: &str, kind: CompilerKind) -> String {
    if lib.starts_with("-l") || lib.ends_with(".lib") {
        return lib.to_string();
    }
    let stem = lib.strip_prefix("lib").unwrap_or(lib);
    match kind {
        CompilerKind::Msvc => format!("{stem}.lib"),
        _ => format!("-l{stem}"),
    }
}

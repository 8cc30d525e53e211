//! Compiler toolchain detection.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use which::which;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerKind {
    Gcc,
    Clang,
    Msvc,
    Mingw,
}

impl CompilerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompilerKind::Gcc => "gcc",
            CompilerKind::Clang => "clang",
            CompilerKind::Msvc => "msvc",
            CompilerKind::Mingw => "mingw",
        }
    }
}

impl std::fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CompilerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gcc" => Ok(CompilerKind::Gcc),
            "clang" => Ok(CompilerKind::Clang),
            "msvc" => Ok(CompilerKind::Msvc),
            "mingw" => Ok(CompilerKind::Mingw),
            _ => Err(()),
        }
    }
}

/// A located compiler: its invocation name/path and (MSVC only) the
/// environment overlay needed to find headers/libs.
#[derive(Debug, Clone)]
pub struct CompilerInfo {
    pub kind: CompilerKind,
    pub program: PathBuf,
    pub env: HashMap<String, String>,
}

/// Probe the host for available C compilers, in priority order for "best":
/// Windows = MSVC -> MinGW -> Clang; Unix = GCC -> Clang.
pub fn enumerate_compilers() -> Vec<CompilerInfo> {
    let mut found = Vec::new();

    if cfg!(windows) {
        if let Some(msvc) = detect_msvc() {
            found.push(msvc);
        }
        if let Ok(p) = which("gcc.exe").or_else(|_| which("gcc")) {
            found.push(CompilerInfo {
                kind: CompilerKind::Mingw,
                program: p,
                env: HashMap::new(),
            });
        }
        if let Ok(p) = which("clang.exe").or_else(|_| which("clang")) {
            found.push(CompilerInfo {
                kind: CompilerKind::Clang,
                program: p,
                env: HashMap::new(),
            });
        }
    } else {
        if let Ok(p) = which("gcc") {
            found.push(CompilerInfo {
                kind: CompilerKind::Gcc,
                program: p,
                env: HashMap::new(),
            });
        }
        if let Ok(p) = which("clang") {
            found.push(CompilerInfo {
                kind: CompilerKind::Clang,
                program: p,
                env: HashMap::new(),
            });
        }
    }

    found
}

/// Pick the best compiler from a probe list, per platform priority.
pub fn best_compiler(found: &[CompilerInfo]) -> Option<&CompilerInfo> {
    let priority: &[CompilerKind] = if cfg!(windows) {
        &[CompilerKind::Msvc, CompilerKind::Mingw, CompilerKind::Clang]
    } else {
        &[CompilerKind::Gcc, CompilerKind::Clang]
    };

    for want in priority {
        if let Some(info) = found.iter().find(|c| c.kind == *want) {
            return Some(info);
        }
    }
    found.first()
}

/// Locate `cl.exe`, either directly on PATH or via a Visual Studio install.
///
/// Falls back to scanning the well-known install roots for the newest
/// version, trying host/target pairs in the order `Hostx64/x64 ->
/// Hostx86/x86 -> Hostx64/x86 -> Hostx86/x64`.
fn detect_msvc() -> Option<CompilerInfo> {
    if let Ok(p) = which("cl.exe").or_else(|_| which("cl")) {
        return Some(CompilerInfo {
            kind: CompilerKind::Msvc,
            program: p,
            env: HashMap::new(),
        });
    }

    let vswhere = PathBuf::from(
        r"C:\Program Files (x86)\Microsoft Visual Studio\Installer\vswhere.exe",
    );
    if vswhere.exists() {
        if let Some(info) = detect_msvc_via_vswhere(&vswhere) {
            return Some(info);
        }
    }

    detect_msvc_via_scan()
}

fn detect_msvc_via_vswhere(vswhere: &Path) -> Option<CompilerInfo> {
    let output = std::process::Command::new(vswhere)
        .args(["-latest", "-property", "installationPath"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let install_path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if install_path.is_empty() {
        return None;
    }
    locate_cl_under(&PathBuf::from(install_path).join(r"VC\Tools\MSVC"))
}

fn detect_msvc_via_scan() -> Option<CompilerInfo> {
    const EDITIONS: &[&str] = &["Enterprise", "Professional", "Community", "BuildTools"];
    const YEARS: &[&str] = &["2022", "2019", "2017"];

    for year in YEARS {
        for edition in EDITIONS {
            let root = PathBuf::from(format!(
                r"C:\Program Files\Microsoft Visual Studio\{year}\{edition}\VC\Tools\MSVC"
            ));
            if let Some(info) = locate_cl_under(&root) {
                return Some(info);
            }
        }
    }
    None
}

/// Under a `VC\Tools\MSVC` directory, pick the newest version subdirectory
/// and try each host/target pair until `cl.exe` is found.
fn locate_cl_under(msvc_root: &Path) -> Option<CompilerInfo> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(msvc_root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort();
    versions.reverse();

    const HOST_TARGET_PAIRS: &[(&str, &str)] = &[
        ("Hostx64", "x64"),
        ("Hostx86", "x86"),
        ("Hostx64", "x86"),
        ("Hostx86", "x64"),
    ];

    for version in &versions {
        for (host, target) in HOST_TARGET_PAIRS {
            let cl = version.join("bin").join(host).join(target).join("cl.exe");
            if cl.exists() {
                let env = msvc_environment(version, target);
                return Some(CompilerInfo {
                    kind: CompilerKind::Msvc,
                    program: cl,
                    env,
                });
            }
        }
    }
    None
}

/// Compose the MSVC `{PATH, INCLUDE, LIB}` overlay from the toolchain's
/// `include`/`lib/<arch>` plus the newest Windows SDK's
/// `Include/<sdk>/{ucrt,um,shared}` and `Lib/<sdk>/{ucrt,um}/<arch>`.
fn msvc_environment(msvc_version_dir: &Path, target_arch: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();

    let include = msvc_version_dir.join("include");
    let lib = msvc_version_dir.join("lib").join(target_arch);
    let mut include_paths = vec![include.display().to_string()];
    let mut lib_paths = vec![lib.display().to_string()];

    if let Some(sdk_root) = newest_windows_sdk() {
        let sdk_include = sdk_root.0.join("Include").join(&sdk_root.1);
        let sdk_lib = sdk_root.0.join("Lib").join(&sdk_root.1);
        for sub in ["ucrt", "um", "shared"] {
            include_paths.push(sdk_include.join(sub).display().to_string());
        }
        for sub in ["ucrt", "um"] {
            lib_paths.push(sdk_lib.join(sub).join(target_arch).display().to_string());
        }
    }

    env.insert("INCLUDE".to_string(), include_paths.join(";"));
    env.insert("LIB".to_string(), lib_paths.join(";"));
    env
}

/// Return `(sdk_root, version)` for the newest installed Windows SDK.
fn newest_windows_sdk() -> Option<(PathBuf, String)> {
    let root = PathBuf::from(r"C:\Program Files (x86)\Windows Kits\10");
    let include_dir = root.join("Include");
    let mut versions: Vec<String> = std::fs::read_dir(&include_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    versions.sort();
    let newest = versions.pop()?;
    Some((root, newest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_compiler_prefers_gcc_on_unix() {
        if cfg!(windows) {
            return;
        }
        let found = vec![
            CompilerInfo {
                kind: CompilerKind::Clang,
                program: "clang".into(),
                env: HashMap::new(),
            },
            CompilerInfo {
                kind: CompilerKind::Gcc,
                program: "gcc".into(),
                env: HashMap::new(),
            },
        ];
        assert_eq!(best_compiler(&found).unwrap().kind, CompilerKind::Gcc);
    }

    #[test]
    fn best_compiler_falls_back_to_first_found() {
        let found = vec![CompilerInfo {
            kind: CompilerKind::Clang,
            program: "clang".into(),
            env: HashMap::new(),
        }];
        assert_eq!(best_compiler(&found).unwrap().kind, CompilerKind::Clang);
    }

    #[test]
    fn compiler_kind_round_trips_through_str() {
        use std::str::FromStr;
        for kind in [
            CompilerKind::Gcc,
            CompilerKind::Clang,
            CompilerKind::Msvc,
            CompilerKind::Mingw,
        ] {
            assert_eq!(CompilerKind::from_str(kind.as_str()), Ok(kind));
        }
    }
}

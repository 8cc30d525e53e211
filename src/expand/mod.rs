//! Variable expansion: `${NAME}` special variables and `${glob-pattern}`
//! filesystem tokens.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::platform;

/// The flat symbol table special variables resolve against.
#[derive(Debug, Clone)]
pub struct SpecialVariables {
    pub test_dir: String,
    pub config_dir: String,
    pub os: String,
    pub arch: String,
    pub platform: String,
    pub cc: String,
    pub profile: String,
    /// Escape hatch for additional named values (e.g. iteration index) that
    /// don't warrant a dedicated enum variant.
    pub extra: HashMap<String, String>,
}

impl SpecialVariables {
    /// Build the table for a test whose source lives in `test_dir` and whose
    /// governing config file lives in `config_dir` (or `None` if no config
    /// was found, in which case `CONFIGDIR` defaults to `TESTDIR`).
    ///
    /// `TESTDIR`/`CONFIGDIR` are *relative* paths from `exe_dir` (the
    /// directory the compiled test binary lives in) so that
    /// `-Wl,-rpath,$ORIGIN/${TESTDIR}/...` constructs remain portable.
    pub fn new(
        exe_dir: &Path,
        test_dir: &Path,
        config_dir: Option<&Path>,
        cc: &str,
        profile: &str,
    ) -> Self {
        let test_dir_rel = relative_from(exe_dir, test_dir);
        let config_dir_rel = config_dir
            .map(|d| relative_from(exe_dir, d))
            .unwrap_or_else(|| test_dir_rel.clone());

        Self {
            test_dir: test_dir_rel,
            config_dir: config_dir_rel,
            os: platform::os().to_string(),
            arch: platform::arch().to_string(),
            platform: platform::platform_tag(),
            cc: cc.to_string(),
            profile: profile.to_string(),
            extra: HashMap::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "TESTDIR" => Some(self.test_dir.clone()),
            "CONFIGDIR" => Some(self.config_dir.clone()),
            "OS" => Some(self.os.clone()),
            "ARCH" => Some(self.arch.clone()),
            "PLATFORM" => Some(self.platform.clone()),
            "CC" => Some(self.cc.clone()),
            "PROFILE" => Some(self.profile.clone()),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// Compute `to` relative to `from`, falling back to the absolute path of `to`
/// if no relative path can be constructed (e.g. different Windows drives).
fn relative_from(from: &Path, to: &Path) -> String {
    pathdiff(from, to)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| to.display().to_string())
}

/// Minimal `from` -> `to` relative path computation over already-absolute,
/// already-normalized paths (no symlink resolution).
fn pathdiff(from: &Path, to: &Path) -> Option<PathBuf> {
    let from_components: Vec<_> = from.components().collect();
    let to_components: Vec<_> = to.components().collect();

    let common = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 {
        return None;
    }

    let mut result = PathBuf::new();
    for _ in common..from_components.len() {
        result.push("..");
    }
    for component in &to_components[common..] {
        result.push(component.as_os_str());
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    Some(result)
}

/// A single scalar or list of strings to expand.
#[derive(Debug, Clone)]
pub enum ExpandInput {
    Scalar(String),
    List(Vec<String>),
}

/// Expand `${NAME}` and `${glob-pattern}` tokens in `value`.
///
/// Known special-variable names substitute literally. Anything else inside
/// `${...}` is treated as a glob pattern rooted at `base_dir`; each match
/// produces one output entry with the token replaced by that match. A
/// pattern with zero matches falls back to the literal pattern text (so
/// library search paths are never silently dropped). Scalars use only the
/// first result of their expansion; lists expand element-wise and flatten.
pub fn expand(input: &ExpandInput, base_dir: &Path, vars: &SpecialVariables) -> Vec<String> {
    match input {
        ExpandInput::Scalar(s) => {
            let results = expand_one(s, base_dir, vars);
            match results.into_iter().next() {
                Some(first) => vec![first],
                None => vec![s.clone()],
            }
        }
        ExpandInput::List(items) => items
            .iter()
            .flat_map(|item| expand_one(item, base_dir, vars))
            .collect(),
    }
}

/// Expand all tokens in a single string, returning every combination
/// produced by glob tokens (special-variable tokens never branch).
fn expand_one(s: &str, base_dir: &Path, vars: &SpecialVariables) -> Vec<String> {
    let Some((before, name, after)) = find_token(s) else {
        return vec![s.to_string()];
    };

    if let Some(value) = vars.lookup(name) {
        let replaced = format!("{before}{value}{after}");
        return expand_one(&replaced, base_dir, vars);
    }

    let matches = glob_matches(name, base_dir);
    if matches.is_empty() {
        // No matches: keep the literal pattern text so the flag isn't dropped.
        let replaced = format!("{before}{name}{after}");
        return expand_one(&replaced, base_dir, vars);
    }

    matches
        .into_iter()
        .flat_map(|m| expand_one(&format!("{before}{m}{after}"), base_dir, vars))
        .collect()
}

/// Find the first `${...}` token, returning `(before, name, after)`.
fn find_token(s: &str) -> Option<(&str, &str, &str)> {
    let start = s.find("${")?;
    let rel_end = s[start..].find('}')?;
    let end = start + rel_end;
    Some((&s[..start], &s[start + 2..end], &s[end + 1..]))
}

fn glob_matches(pattern: &str, base_dir: &Path) -> Vec<String> {
    let full_pattern = base_dir.join(pattern);
    let Some(pattern_str) = full_pattern.to_str() else {
        return Vec::new();
    };
    match glob::glob(pattern_str) {
        Ok(paths) => paths
            .filter_map(|r| r.ok())
            .map(|p| p.display().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Normalize `-rpath,` linker flags so `$ORIGIN` (Linux) and
/// `@executable_path` (macOS) are interchangeable depending on target
/// platform. Involutive: normalizing twice is the same as normalizing once.
pub fn normalize_rpath(flag: &str) -> String {
    if !flag.contains("-rpath,") {
        return flag.to_string();
    }

    if platform::is_macos() {
        flag.replace("$ORIGIN", "@executable_path")
            .replace("@loader_path", "@executable_path")
    } else {
        flag.replace("@executable_path", "$ORIGIN")
            .replace("@loader_path", "$ORIGIN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> SpecialVariables {
        SpecialVariables {
            test_dir: "../..".into(),
            config_dir: "..".into(),
            os: "linux".into(),
            arch: "x64".into(),
            platform: "linux-x64".into(),
            cc: "gcc".into(),
            profile: "dev".into(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn expands_known_special_variable() {
        let out = expand(
            &ExpandInput::Scalar("-Wl,-rpath,$ORIGIN/${TESTDIR}/lib".into()),
            Path::new("/tmp"),
            &vars(),
        );
        assert_eq!(out, vec!["-Wl,-rpath,$ORIGIN/../../lib".to_string()]);
    }

    #[test]
    fn unresolved_glob_keeps_literal_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = expand(
            &ExpandInput::Scalar("${nonexistent-*.so}".into()),
            dir.path(),
            &vars(),
        );
        assert_eq!(out, vec!["nonexistent-*.so".to_string()]);
    }

    #[test]
    fn glob_expands_to_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("liba.so"), b"").unwrap();
        std::fs::write(dir.path().join("libb.so"), b"").unwrap();
        let out = expand(&ExpandInput::Scalar("${lib*.so}".into()), dir.path(), &vars());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn list_expansion_flattens() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.o"), b"").unwrap();
        std::fs::write(dir.path().join("b.o"), b"").unwrap();
        let out = expand(
            &ExpandInput::List(vec!["${*.o}".into(), "static.flag".into()]),
            dir.path(),
            &vars(),
        );
        assert_eq!(out.len(), 3);
        assert!(out.contains(&"static.flag".to_string()));
    }

    #[test]
    fn expansion_is_referentially_transparent_once_resolved() {
        let once = expand(
            &ExpandInput::Scalar("${PLATFORM}".into()),
            Path::new("/tmp"),
            &vars(),
        );
        let twice = expand(
            &ExpandInput::Scalar(once[0].clone()),
            Path::new("/tmp"),
            &vars(),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn rpath_normalize_is_involutive_on_linux() {
        if !platform::is_linux() {
            return;
        }
        let once = normalize_rpath("-Wl,-rpath,@executable_path/../lib");
        let twice = normalize_rpath(&once);
        assert_eq!(once, twice);
        assert!(once.contains("$ORIGIN"));
    }

    #[test]
    fn rpath_normalize_ignores_unrelated_flags() {
        assert_eq!(normalize_rpath("-O2"), "-O2");
    }

    #[test]
    fn pathdiff_computes_relative_path() {
        let from = Path::new("/a/b/c/.testme");
        let to = Path::new("/a/b/d");
        let rel = pathdiff(from, to).unwrap();
        assert_eq!(rel, PathBuf::from("../../d"));
    }
}

//! Discovery: walk roots, identify `<stem>.tst.<ext>` files, apply
//! include/exclude patterns and `enable`/`depth` gating.
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::schema::{Enable, PatternsConfig};

const PRUNED_DIR_NAMES: &[&str] = &[".testme", ".git", "node_modules"];

/// The resolved handler type for a test, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestType {
    Shell,
    PowerShell,
    Batch,
    C,
    JavaScript,
    TypeScript,
    Python,
    Go,
    Ejscript,
}

impl TestType {
    /// Map a lowercase extension (no leading dot) to its test type, or
    /// `None` if it isn't a recognized test language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext {
            "sh" => TestType::Shell,
            "ps1" => TestType::PowerShell,
            "bat" | "cmd" => TestType::Batch,
            "c" => TestType::C,
            "js" => TestType::JavaScript,
            "ts" => TestType::TypeScript,
            "py" => TestType::Python,
            "go" => TestType::Go,
            "es" => TestType::Ejscript,
            _ => return None,
        })
    }
}

/// One discovered test. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFile {
    pub path: PathBuf,
    pub stem: String,
    pub directory: PathBuf,
    pub extension: String,
    pub test_type: TestType,
}

impl TestFile {
    /// Parse `<stem>.tst.<ext>` out of `path`, returning `None` if it
    /// doesn't match the grammar or the extension isn't recognized.
    fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let ext = path.extension()?.to_str()?.to_string();
        let test_type = TestType::from_extension(&ext)?;

        let stem_with_tst = file_name.strip_suffix(&format!(".{ext}"))?;
        let stem = stem_with_tst.strip_suffix(".tst")?.to_string();
        if stem.is_empty() {
            return None;
        }

        Some(TestFile {
            path: path.to_path_buf(),
            stem,
            directory: path.parent()?.to_path_buf(),
            extension: ext,
            test_type,
        })
    }
}

/// Caller-supplied filter on top of per-directory config.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    /// Explicit name patterns from the CLI (`testme run foo bar*`).
    pub name_patterns: Vec<String>,
    pub depth: u32,
}

/// Walk `roots`, returning every matching [`TestFile`] after applying
/// `patterns`/`enable`/`depth` gating. `config_for` resolves the governing
/// `enable`/`depth`/patterns for a given directory (callers pass a closure
/// backed by [`crate::config::load_for_dir`] so discovery doesn't need to
/// know about the config layer directly).
pub fn discover<F>(roots: &[PathBuf], filter: &DiscoveryFilter, mut config_for: F) -> Vec<TestFile>
where
    F: FnMut(&Path) -> (Enable, u32, PatternsConfig),
{
    let mut results = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
            if !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !PRUNED_DIR_NAMES.contains(&name.as_ref()) && !is_hidden(&name)
        });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "error walking directory tree");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(test_file) = TestFile::from_path(entry.path()) else {
                continue;
            };

            let (enable, depth, patterns) = config_for(&test_file.directory);

            if !matches_patterns(&test_file, &patterns) {
                continue;
            }
            if !matches_name_patterns(&test_file, &filter.name_patterns) {
                continue;
            }
            if !passes_enable_gate(enable, &test_file, &filter.name_patterns) {
                continue;
            }
            if filter.depth < depth {
                continue;
            }

            debug!(path = %test_file.path.display(), "discovered test");
            results.push(test_file);
        }
    }

    results
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

fn matches_patterns(test_file: &TestFile, patterns: &PatternsConfig) -> bool {
    if !patterns.include.is_empty() {
        let include_set = build_glob_set(&patterns.include);
        if !include_set.is_match(&test_file.path) {
            return false;
        }
    }
    if !patterns.exclude.is_empty() {
        let exclude_set = build_glob_set(&patterns.exclude);
        if exclude_set.is_match(&test_file.path) {
            return false;
        }
    }
    true
}

fn build_glob_set(patterns: &[String]) -> globset::GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        } else {
            warn!(pattern, "invalid glob pattern, ignoring");
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// A name pattern matches if it equals the stem, the full basename, or —
/// when it contains a path separator — the relative-to-CWD path ending in
/// the file. No patterns at all means "match everything".
fn matches_name_patterns(test_file: &TestFile, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let basename = test_file.path.file_name().unwrap().to_string_lossy().to_string();
    patterns.iter().any(|p| {
        p == &test_file.stem
            || p == &basename
            || (p.contains(std::path::MAIN_SEPARATOR) && test_file.path.ends_with(p))
    })
}

/// `false` silently drops the file. `manual` drops it unless a CLI pattern
/// names it explicitly and without wildcard characters.
fn passes_enable_gate(enable: Enable, test_file: &TestFile, patterns: &[String]) -> bool {
    match enable {
        Enable::False => false,
        Enable::True => true,
        Enable::Manual => patterns.iter().any(|p| {
            !p.contains('*') && !p.contains('?') && (p == &test_file.stem || test_file.path.ends_with(p))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(enable: Enable, depth: u32) -> impl FnMut(&Path) -> (Enable, u32, PatternsConfig) {
        move |_| (enable, depth, PatternsConfig::default())
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn recognizes_double_suffix_grammar() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "basic.tst.c");
        touch(dir.path(), "not_a_test.c");
        touch(dir.path(), "basic.tst.unknown");

        let files = discover(
            &[dir.path().to_path_buf()],
            &DiscoveryFilter::default(),
            always(Enable::True, 0),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem, "basic");
        assert_eq!(files[0].test_type, TestType::C);
    }

    #[test]
    fn prunes_testme_and_git_directories() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".testme");
        std::fs::create_dir(&hidden).unwrap();
        touch(&hidden, "ghost.tst.c");
        touch(dir.path(), "real.tst.c");

        let files = discover(
            &[dir.path().to_path_buf()],
            &DiscoveryFilter::default(),
            always(Enable::True, 0),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem, "real");
    }

    #[test]
    fn enable_false_drops_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "disabled.tst.c");
        let files = discover(
            &[dir.path().to_path_buf()],
            &DiscoveryFilter::default(),
            always(Enable::False, 0),
        );
        assert!(files.is_empty());
    }

    #[test]
    fn manual_requires_explicit_nonwildcard_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "manual.tst.c");

        let no_filter = DiscoveryFilter::default();
        let files = discover(
            &[dir.path().to_path_buf()],
            &no_filter,
            always(Enable::Manual, 0),
        );
        assert!(files.is_empty());

        let wildcard_filter = DiscoveryFilter {
            name_patterns: vec!["man*".to_string()],
            depth: 0,
        };
        let files = discover(
            &[dir.path().to_path_buf()],
            &wildcard_filter,
            always(Enable::Manual, 0),
        );
        assert!(files.is_empty());

        let explicit_filter = DiscoveryFilter {
            name_patterns: vec!["manual".to_string()],
            depth: 0,
        };
        let files = discover(
            &[dir.path().to_path_buf()],
            &explicit_filter,
            always(Enable::Manual, 0),
        );
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn depth_gate_drops_when_caller_depth_too_low() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "deep.tst.c");
        let filter = DiscoveryFilter { name_patterns: vec![], depth: 0 };
        let files = discover(&[dir.path().to_path_buf()], &filter, always(Enable::True, 2));
        assert!(files.is_empty());

        let filter = DiscoveryFilter { name_patterns: vec![], depth: 2 };
        let files = discover(&[dir.path().to_path_buf()], &filter, always(Enable::True, 2));
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn include_exclude_patterns_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "keep.tst.c");
        touch(dir.path(), "drop.tst.c");

        let patterns = PatternsConfig {
            include: vec!["**/*.tst.c".to_string()],
            exclude: vec!["**/drop.tst.c".to_string()],
        };
        let files = discover(
            &[dir.path().to_path_buf()],
            &DiscoveryFilter::default(),
            move |_| (Enable::True, 0, patterns.clone()),
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem, "keep");
    }
}

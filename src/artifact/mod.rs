//! Artifact manager: per-test `.testme` scratch directory allocation and
//! cleanup.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TestmeError};
use crate::platform;

pub const ARTIFACT_DIR_NAME: &str = ".testme";

/// The `.testme` scratch directory for a test living in `test_dir`, and the
/// binary path within it for a source file named `stem`.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub dir: PathBuf,
    pub binary_path: PathBuf,
}

/// The `.testme` scratch directory path for a test living in `test_dir`.
/// Every test file in the same `test_dir` shares this directory, so it must
/// not be removed until every such test has finished.
pub fn dir_for(test_dir: &Path) -> PathBuf {
    test_dir.join(ARTIFACT_DIR_NAME)
}

/// Ensure `<test_dir>/.testme` exists and compute the binary path for `stem`
/// (platform executable extension added automatically).
pub fn allocate(test_dir: &Path, stem: &str) -> Result<Artifact> {
    let dir = dir_for(test_dir);
    std::fs::create_dir_all(&dir).map_err(|e| TestmeError::Discovery {
        path: dir.clone(),
        source: e,
    })?;
    let binary_name = platform::process::add_binary_extension(stem);
    let binary_path = dir.join(binary_name);
    Ok(Artifact { dir, binary_path })
}

/// Decide whether to remove the artifact directory after a test: remove on
/// pass, keep on fail or when the caller requested `--keep`.
pub fn should_remove(passed: bool, keep: bool) -> bool {
    passed && !keep
}

/// Remove `test_dir`'s `.testme` directory if `should_remove` says to, given
/// that `all_passed` reflects every test in `test_dir` that ran this group
/// (not just one of them). Callers must only invoke this once all tests
/// sharing `test_dir` have finished, since the directory is shared across
/// them. Never fails the run if removal itself fails.
pub fn cleanup(test_dir: &Path, all_passed: bool, keep: bool) {
    if !should_remove(all_passed, keep) {
        return;
    }
    let dir = dir_for(test_dir);
    if let Err(e) = std::fs::remove_dir_all(&dir) {
        debug!(dir = %dir.display(), error = %e, "artifact cleanup failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_creates_directory_and_binary_path() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = allocate(dir.path(), "mytest").unwrap();
        assert!(artifact.dir.is_dir());
        assert_eq!(artifact.dir, dir.path().join(".testme"));
        assert!(artifact.binary_path.starts_with(&artifact.dir));
    }

    #[test]
    fn should_remove_on_pass_unless_keep_requested() {
        assert!(should_remove(true, false));
        assert!(!should_remove(true, true));
        assert!(!should_remove(false, false));
        assert!(!should_remove(false, true));
    }

    #[test]
    fn cleanup_removes_directory_when_should_remove() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = allocate(dir.path(), "mytest").unwrap();
        cleanup(dir.path(), true, false);
        assert!(!artifact.dir.exists());
    }

    #[test]
    fn cleanup_keeps_directory_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = allocate(dir.path(), "mytest").unwrap();
        cleanup(dir.path(), false, false);
        assert!(artifact.dir.exists());
    }

    #[test]
    fn cleanup_is_shared_across_tests_in_the_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = allocate(dir.path(), "a").unwrap();
        let _b = allocate(dir.path(), "b").unwrap();
        assert_eq!(a.dir, dir_for(dir.path()));
        cleanup(dir.path(), true, false);
        assert!(!a.dir.exists());
    }
}

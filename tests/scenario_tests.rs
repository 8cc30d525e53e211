//! End-to-end scenarios against the public engine API, mirroring the
//! concrete scenarios (S1-S7) and top-level invariants used to validate
//! this runner.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use testme::discovery::{self, DiscoveryFilter, TestType};
use testme::reporter::SimpleReporter;
use testme::scheduler::{self, RunOptions};

fn touch(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn run_in(dir: &std::path::Path) -> i32 {
    let options = RunOptions {
        roots: vec![dir.to_path_buf()],
        ..RunOptions::default()
    };
    let mut reporter = SimpleReporter::new(false);
    let cancel = Arc::new(AtomicBool::new(false));
    scheduler::run(&options, &mut reporter, &cancel)
}

// ---------------------------------------------------------------------------
// S1 - basic C test
// ---------------------------------------------------------------------------

#[test]
fn s1_passing_c_test_cleans_up_its_artifacts() {
    if which::which("gcc").is_err() && which::which("cc").is_err() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "add.tst.c", "int main(void) { return 0; }\n");

    let code = run_in(dir.path());
    assert_eq!(code, 0);
    assert!(!dir.path().join(".testme").exists());
}

// ---------------------------------------------------------------------------
// S2 - failing test surfaces stderr and fails the run
// ---------------------------------------------------------------------------

#[test]
fn s2_failing_shell_test_fails_the_run() {
    if cfg!(windows) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.tst.sh");
    std::fs::write(&script, "#!/bin/sh\necho 'expected 5 got 6' 1>&2\nexit 1\n").unwrap();
    testme::platform::process::make_executable(&script).unwrap();

    let code = run_in(dir.path());
    assert_eq!(code, 1);
}

// ---------------------------------------------------------------------------
// S3 - timeout
// ---------------------------------------------------------------------------

#[test]
fn s3_slow_shell_test_times_out() {
    if cfg!(windows) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("testme.json5"), "{ execution: { timeout: 300 } }").unwrap();
    let script = dir.path().join("slow.tst.sh");
    std::fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
    testme::platform::process::make_executable(&script).unwrap();

    let start = std::time::Instant::now();
    let code = run_in(dir.path());
    let elapsed = start.elapsed();

    assert_eq!(code, 1);
    assert!(elapsed.as_millis() < 5000, "runner did not enforce the timeout promptly");
}

// ---------------------------------------------------------------------------
// S5 - manual gating
// ---------------------------------------------------------------------------

#[test]
fn s5_manual_gate_runs_nothing_without_a_pattern() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("testme.json5"), "{ enable: 'manual' }").unwrap();
    touch(dir.path(), "a.tst.sh", "#!/bin/sh\nexit 0\n");
    touch(dir.path(), "b.tst.sh", "#!/bin/sh\nexit 0\n");

    let filter = DiscoveryFilter::default();
    let files = discovery::discover(&[dir.path().to_path_buf()], &filter, |d| {
        let (config, _) = testme::config::load_for_dir(d, None).unwrap();
        (config.enable, config.depth, config.patterns)
    });
    assert!(files.is_empty());
}

#[test]
fn s5_manual_gate_runs_exactly_the_named_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("testme.json5"), "{ enable: 'manual' }").unwrap();
    touch(dir.path(), "a.tst.sh", "#!/bin/sh\nexit 0\n");
    touch(dir.path(), "b.tst.sh", "#!/bin/sh\nexit 0\n");

    let filter = DiscoveryFilter {
        name_patterns: vec!["a".to_string()],
        depth: 0,
    };
    let files = discovery::discover(&[dir.path().to_path_buf()], &filter, |d| {
        let (config, _) = testme::config::load_for_dir(d, None).unwrap();
        (config.enable, config.depth, config.patterns)
    });
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].stem, "a");
}

// ---------------------------------------------------------------------------
// S6 - config inheritance
// ---------------------------------------------------------------------------

#[test]
fn s6_env_and_flags_inherit_while_execution_does_not() {
    let root = tempfile::tempdir().unwrap();
    let child = root.path().join("sub");
    std::fs::create_dir(&child).unwrap();

    std::fs::write(
        root.path().join("testme.json5"),
        r#"{
            env: { PARENT: '1' },
            compiler: { c: { flags: ['-DP'] } },
            inherit: ['env', 'compiler'],
            execution: { timeout: 9999 },
        }"#,
    )
    .unwrap();
    std::fs::write(
        child.join("testme.json5"),
        r#"{
            env: { CHILD: '2' },
            compiler: { c: { flags: ['-DC'] } },
        }"#,
    )
    .unwrap();

    let (config, _) = testme::config::load_for_dir(&child, None).unwrap();

    assert_eq!(config.env.get("PARENT"), Some(&"1".to_string()));
    assert_eq!(config.env.get("CHILD"), Some(&"2".to_string()));
    assert!(config.compiler.c.flags.contains(&"-DP".to_string()));
    assert!(config.compiler.c.flags.contains(&"-DC".to_string()));
    // execution isn't in the inherit set, so the child's own default (30000) wins,
    // not the parent's override of 9999.
    assert_eq!(config.execution.timeout, 30000);
}

// ---------------------------------------------------------------------------
// S7 - flag translation to MSVC
// ---------------------------------------------------------------------------

#[test]
fn s7_gcc_flags_translate_to_msvc_equivalents() {
    use testme::compiler::flags::translate;
    use testme::platform::compiler::CompilerKind;

    assert_eq!(translate("-Wall", CompilerKind::Msvc), "/W4");
    assert_eq!(translate("-O2", CompilerKind::Msvc), "/O2");
    assert_eq!(translate("-DDEBUG", CompilerKind::Msvc), "/DDEBUG");
    assert_eq!(translate("-I./inc", CompilerKind::Msvc), "/I./inc");
}

// ---------------------------------------------------------------------------
// Invariant 1: discovery set is independent of walk order and matches the
// <stem>.tst.<ext> grammar exactly.
// ---------------------------------------------------------------------------

#[test]
fn invariant_discovery_set_excludes_non_matching_names() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "real.tst.sh", "#!/bin/sh\nexit 0\n");
    touch(dir.path(), "not_a_test.sh", "#!/bin/sh\nexit 0\n");
    touch(dir.path(), "real.tst.unknownext", "");

    let filter = DiscoveryFilter::default();
    let files = discovery::discover(&[dir.path().to_path_buf()], &filter, |d| {
        let (config, _) = testme::config::load_for_dir(d, None).unwrap();
        (config.enable, config.depth, config.patterns)
    });
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].test_type, TestType::Shell);
}

// ---------------------------------------------------------------------------
// Boundary: depth = 0 runs everything; higher depth narrows the set.
// ---------------------------------------------------------------------------

#[test]
fn boundary_depth_zero_runs_all_tests() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("testme.json5"), "{ depth: 3 }").unwrap();
    touch(dir.path(), "deep.tst.sh", "#!/bin/sh\nexit 0\n");

    let filter = DiscoveryFilter { name_patterns: vec![], depth: 3 };
    let files = discovery::discover(&[dir.path().to_path_buf()], &filter, |d| {
        let (config, _) = testme::config::load_for_dir(d, None).unwrap();
        (config.enable, config.depth, config.patterns)
    });
    assert_eq!(files.len(), 1);
}

// ---------------------------------------------------------------------------
// Invariant 5: a successful run without --keep removes its .testme directory.
// ---------------------------------------------------------------------------

#[test]
fn invariant_no_artifact_directory_survives_a_clean_pass() {
    if cfg!(windows) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "ok.tst.sh", "#!/bin/sh\nexit 0\n");
    testme::platform::process::make_executable(&dir.path().join("ok.tst.sh")).unwrap();

    let code = run_in(dir.path());
    assert_eq!(code, 0);
    assert!(!dir.path().join(".testme").exists());
}

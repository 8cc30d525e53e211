//! S4 (service lifecycle) exercised through the full scheduler pipeline,
//! plus the "no residual process" invariants that depend on it.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use testme::reporter::SimpleReporter;
use testme::scheduler::{self, RunOptions};

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
// S4 - setup is started before the test runs and torn down afterward
// ---------------------------------------------------------------------------

#[test]
fn s4_setup_marker_file_exists_only_while_tests_run() {
    if cfg!(windows) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("setup.pid");

    std::fs::write(
        dir.path().join("testme.json5"),
        format!(
            r#"{{
                services: {{
                    setup: "echo $$ > {marker} && sleep 5",
                    delay: 100,
                }},
            }}"#,
            marker = marker.display()
        ),
    )
    .unwrap();

    let test_script = dir.path().join("probe.tst.sh");
    std::fs::write(
        &test_script,
        format!("#!/bin/sh\ntest -f {} && exit 0 || exit 1\n", marker.display()),
    )
    .unwrap();
    testme::platform::process::make_executable(&test_script).unwrap();

    let code = run_in(dir.path());
    assert_eq!(code, 0, "test should observe the setup marker file while it runs");

    std::thread::sleep(std::time::Duration::from_millis(200));
    let pid: u32 = std::fs::read_to_string(&marker).unwrap().trim().parse().unwrap();
    assert!(
        !testme::platform::process::is_process_running(pid),
        "setup process should have been killed during group teardown"
    );
}

// ---------------------------------------------------------------------------
// S4 - skip prevents the group (and its setup) from ever starting
// ---------------------------------------------------------------------------

#[test]
fn skip_command_prevents_setup_from_running() {
    if cfg!(windows) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("should-not-exist");

    std::fs::write(
        dir.path().join("testme.json5"),
        format!(
            r#"{{
                services: {{
                    skip: "exit 1",
                    setup: "touch {}",
                }},
            }}"#,
            marker.display()
        ),
    )
    .unwrap();

    let test_script = dir.path().join("never.tst.sh");
    std::fs::write(&test_script, "#!/bin/sh\nexit 0\n").unwrap();
    testme::platform::process::make_executable(&test_script).unwrap();

    let code = run_in(dir.path());
    assert_eq!(code, 0, "a skipped group should not fail the overall run");
    assert!(!marker.exists(), "setup should never have run once skip rejected the group");
}

mod stub;

use std::collections::HashMap;
use std::path::Path;

use predicates::prelude::*;
use stub::{Stub, StubConfig, catalog_hit, request_record};

fn reqscout(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("reqscout");
    cmd.env_remove("REQSCOUT_MAM_ID")
        .env_remove("REQSCOUT_LOG")
        .env("REQSCOUT_DATA_DIR", data_dir)
        .env("REQSCOUT_REQUEST_DELAY_MS", "0")
        .env("REQSCOUT_RETRY_DELAY_MS", "0")
        .env("REQSCOUT_MAX_RETRIES", "1");
    cmd
}

fn against(cmd: &mut assert_cmd::Command, stub: &Stub) {
    cmd.env("REQSCOUT_TRACKER_URL", &stub.base_url)
        .env("REQSCOUT_CATALOG_URL", stub.url("/graphql"))
        .env("REQSCOUT_CATALOG_TITLE_URL", "https://catalog.example/title")
        .env("REQSCOUT_METADATA_URL", stub.url("/book/auto_complete"));
}

#[test]
fn cursor_show_prints_zero_without_state() {
    let temp = tempfile::TempDir::new().unwrap();
    reqscout(temp.path())
        .args(["cursor", "show"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn session_set_persists_token() {
    let temp = tempfile::TempDir::new().unwrap();
    reqscout(temp.path())
        .args(["session", "set", "abc123"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(temp.path().join("session.json")).unwrap();
    assert!(saved.contains("abc123"));
}

#[test]
fn session_set_rejects_blank_token() {
    let temp = tempfile::TempDir::new().unwrap();
    reqscout(temp.path())
        .args(["session", "set", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mam_id must not be empty"));
}

#[test]
fn run_prints_matches_and_appends_csv() {
    let stub = Stub::spawn(StubConfig {
        listing: vec![
            request_record(12, "Dune: A Novel", &["Frank Herbert"], "Ebooks - Science Fiction"),
            request_record(11, "Unmatched", &["Nobody"], "Ebooks - Fantasy"),
        ],
        catalog_hits: HashMap::from([(
            "Frank Herbert".to_owned(),
            vec![catalog_hit(1, "Dune", Some("A Novel"))],
        )]),
        ..StubConfig::default()
    });
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("matches.csv");

    let mut cmd = reqscout(temp.path());
    against(&mut cmd, &stub);
    cmd.env("REQSCOUT_MAM_ID", "token")
        .args(["run", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dune: A Novel"))
        .stdout(predicate::str::contains("https://catalog.example/title/1"))
        .stdout(predicate::str::contains("Unmatched").not());

    let csv = std::fs::read_to_string(&out).unwrap();
    assert_eq!(csv.lines().count(), 2, "{csv}");
    assert!(csv.starts_with("found_at,request_id,"));

    reqscout(temp.path())
        .args(["cursor", "show"])
        .assert()
        .success()
        .stdout("12\n");
}

#[test]
fn expired_session_without_terminal_fails() {
    let stub = Stub::spawn(StubConfig {
        listing: vec![request_record(1, "Dune", &["Frank Herbert"], "Ebooks - Science Fiction")],
        required_session: Some("fresh".to_owned()),
        ..StubConfig::default()
    });
    let temp = tempfile::TempDir::new().unwrap();

    let mut cmd = reqscout(temp.path());
    against(&mut cmd, &stub);
    cmd.env("REQSCOUT_MAM_ID", "stale")
        .args(["run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no new session token"));
    assert!(!temp.path().join("cursor").exists());
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let temp = tempfile::TempDir::new().unwrap();
    reqscout(temp.path())
        .env("RUST_LOG", "debug")
        .args(["cursor", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[cfg(unix)]
#[test]
fn sigint_during_failing_fetch_exits_early_with_failure() {
    use std::io::Read as _;
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    let stub = Stub::spawn(StubConfig {
        listing_failures: 1000,
        ..StubConfig::default()
    });
    let temp = tempfile::TempDir::new().unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_reqscout"))
        .arg("run")
        .env_remove("REQSCOUT_LOG")
        .env("REQSCOUT_DATA_DIR", temp.path())
        .env("REQSCOUT_TRACKER_URL", &stub.base_url)
        .env("REQSCOUT_CATALOG_URL", stub.url("/graphql"))
        .env("REQSCOUT_METADATA_URL", stub.url("/book/auto_complete"))
        .env("REQSCOUT_MAM_ID", "token")
        .env("REQSCOUT_REQUEST_DELAY_MS", "0")
        .env("REQSCOUT_RETRY_DELAY_MS", "2000")
        .env("REQSCOUT_MAX_RETRIES", "5")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(700));
    let started = Instant::now();
    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if started.elapsed() > Duration::from_secs(5) {
            let _ = child.kill();
            panic!("run kept going after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(!status.success());

    let mut stderr = String::new();
    child.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
    assert!(stderr.contains("interrupted"), "{stderr}");
    assert!(!temp.path().join("cursor").exists());
}

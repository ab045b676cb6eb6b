//! CLI contract tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use assert_cmd::Command;

fn data(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(file)
}

/// Binary run from an empty directory with no config, `.env` or API key.
fn deskcoach(workdir: &Path) -> Command {
    let mut cmd = match Command::cargo_bin("deskcoach") {
        Ok(cmd) => cmd,
        Err(err) => panic!("binary should build: {err}"),
    };
    cmd.current_dir(workdir)
        .env_remove("LLM_API_KEY")
        .env_remove("LLM_API_URL")
        .env_remove("LLM_MODEL")
        .env_remove("DESKCOACH_CONFIG")
        .env_remove("DESKCOACH_SCENARIOS")
        .env_remove("DESKCOACH_HOTEL")
        .env("DESKCOACH_PROFILE", data("hotel_profile.yaml"))
        .env("DESKCOACH_REFERENCE", data("hotel_training_reference.yaml"));
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn scenarios_lists_builtin_ids_without_a_key() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .arg("scenarios")
        .output()
        .expect("should run");
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("noise-upgrade"));
    assert!(stdout.contains("lost-key"));
}

#[test]
fn scenarios_reads_configured_catalog() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .env("DESKCOACH_SCENARIOS", data("scenarios.yaml"))
        .arg("scenarios")
        .output()
        .expect("should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("wifi-outage"));
}

#[test]
fn check_fails_without_api_key() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .arg("check")
        .output()
        .expect("should run");
    assert!(!output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("FAIL  credential"));
    assert!(stdout.contains("LLM_API_KEY"));
    assert!(stdout.contains("ok    profile"));
}

#[test]
fn check_passes_with_key_in_dotenv() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    std::fs::write(dir.path().join(".env"), "LLM_API_KEY=sk-test\n").expect("should write .env");
    let output = deskcoach(dir.path())
        .arg("check")
        .output()
        .expect("should run");
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
}

#[test]
fn grade_rejects_empty_reply_before_any_call() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .env("LLM_API_KEY", "sk-test")
        // Unroutable endpoint: a network call would fail differently.
        .env("LLM_API_URL", "http://127.0.0.1:9/v1")
        .args(["grade", "--scenario", "noise-upgrade", "--reply", "   "])
        .output()
        .expect("should run");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot submit"));
}

#[test]
fn grade_without_key_is_config_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .args(["grade", "--scenario", "noise-upgrade", "--reply", "Sorry."])
        .output()
        .expect("should run");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Rendered once, not echoed again by a log line.
    assert_eq!(stderr.matches("LLM_API_KEY").count(), 1, "stderr: {stderr}");
    assert!(stderr.contains("Configuration problem"), "stderr: {stderr}");
}

#[test]
fn grade_with_unknown_hotel_is_config_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .env("LLM_API_KEY", "sk-test")
        .env("DESKCOACH_HOTEL", "grand-budapest")
        .args(["grade", "--scenario", "noise-upgrade", "--reply", "Sorry."])
        .output()
        .expect("should run");
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("grand-budapest"));
}

/// Answer `connections` requests: `GET .../models` with a model list, anything
/// else with a chat completion. Every answer uses `status_line`.
fn serve_endpoint(status_line: &'static str, connections: usize) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("should bind");
    let addr = listener.local_addr().expect("should have addr");
    let handle = std::thread::spawn(move || {
        for _ in 0..connections {
            let Ok((mut socket, _)) = listener.accept() else {
                return;
            };
            let mut buf = [0_u8; 8192];
            let read = socket.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..read]);
            let body = if request.starts_with("GET") && request.contains("/models") {
                r#"{"object":"list","data":[{"id":"gpt-4o"},{"id":"gpt-4o-mini"}]}"#.to_owned()
            } else {
                serde_json::json!({
                    "model": "gpt-4o-2024-08-06",
                    "choices": [{
                        "message": {"role": "assistant", "content": "ok"},
                        "finish_reason": "stop"
                    }]
                })
                .to_string()
            };
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes());
        }
    });
    (format!("http://{addr}/v1"), handle)
}

#[test]
fn live_check_reaches_endpoint() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (url, server) = serve_endpoint("200 OK", 2);
    let output = deskcoach(dir.path())
        .env("LLM_API_KEY", "sk-test")
        .env("LLM_API_URL", &url)
        .env("LLM_MODEL", "gpt-4o")
        .args(["check", "--live"])
        .output()
        .expect("should run");
    let stdout = stdout_of(&output);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("ok    models      2 listed, gpt-4o among them"));
    assert!(stdout.contains("ok    completion  answered by gpt-4o-2024-08-06"));
    server.join().expect("server thread should finish");
}

#[test]
fn live_check_reports_rejected_key() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (url, server) = serve_endpoint("401 Unauthorized", 2);
    let output = deskcoach(dir.path())
        .env("LLM_API_KEY", "sk-wrong")
        .env("LLM_API_URL", &url)
        .args(["check", "--live"])
        .output()
        .expect("should run");
    assert!(!output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("FAIL  models"), "stdout: {stdout}");
    assert!(stdout.contains("FAIL  completion"), "stdout: {stdout}");
    assert!(stdout.contains("(unauthorized)"), "stdout: {stdout}");
    assert!(stdout.contains("ok    credential"), "stdout: {stdout}");
    server.join().expect("server thread should finish");
}

#[test]
fn live_check_flags_unlisted_model() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (url, server) = serve_endpoint("200 OK", 2);
    let output = deskcoach(dir.path())
        .env("LLM_API_KEY", "sk-test")
        .env("LLM_API_URL", &url)
        .env("LLM_MODEL", "openai.gpt-4o")
        .args(["check", "--live"])
        .output()
        .expect("should run");
    assert!(!output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("FAIL  models"), "stdout: {stdout}");
    assert!(stdout.contains("`openai.gpt-4o` is not among the 2 listed"), "stdout: {stdout}");
    assert!(stdout.contains("ok    completion"), "stdout: {stdout}");
    server.join().expect("server thread should finish");
}

#[test]
fn reference_search_finds_upgrade_policy() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .args(["reference", "search", "upgrade", "--top-k", "1"])
        .output()
        .expect("should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("service_recovery / upgrades"));
}

#[test]
fn reference_stats_names_source() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = deskcoach(dir.path())
        .args(["reference", "stats"])
        .output()
        .expect("should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("sections from hotel_training_reference.yaml"));
}

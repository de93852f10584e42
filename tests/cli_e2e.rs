//! End-to-end CLI tests for the snare binary.

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("snare").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch a URL"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("snare").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("snare"));
}

/// Test that a missing URL causes non-zero exit.
#[test]
fn test_binary_missing_url_returns_error() {
    let mut cmd = Command::cargo_bin("snare").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that an unknown --set key is rejected before any request.
#[test]
fn test_binary_unknown_option_key_fails() {
    let mut cmd = Command::cargo_bin("snare").unwrap();
    cmd.args(["--set", "follow_redirects=true", "http://127.0.0.1:9/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("follow_redirects"));
}

#[tokio::test]
async fn test_binary_prints_body_and_headers() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/hello"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Served-By", "mock")
                .set_body_string("hello world"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/hello", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("snare")
            .unwrap()
            .args(["-q", "--include", &url])
            .assert()
    })
    .await
    .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("HTTP 200"))
        .stdout(predicate::str::contains("x-served-by: mock"))
        .stdout(predicate::str::ends_with("hello world"));
}

#[tokio::test]
async fn test_binary_posts_data_with_headers() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("X-Token", "abc"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/submit", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("snare")
            .unwrap()
            .args(["-q", "-d", "payload", "-H", "X-Token: abc", &url])
            .assert()
    })
    .await
    .unwrap();
    assert.success().stdout(predicate::str::contains("created"));
}

#[tokio::test]
async fn test_binary_writes_output_file_and_session() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "sid=42; Path=/")
                .set_body_string("saved body"),
        )
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.html");
    let session = dir.path().join("session.json");
    let url = format!("{}/doc", mock_server.uri());
    let args = vec![
        "-q".to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "--session".to_string(),
        session.display().to_string(),
        url,
    ];
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("snare").unwrap().args(&args).assert()
    })
    .await
    .unwrap();
    assert.success();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "saved body");
    let snapshot = std::fs::read_to_string(&session).unwrap();
    assert!(snapshot.contains("\"sid\""));
}

#[tokio::test]
async fn test_binary_redirect_limit_failure() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/loop", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("snare")
            .unwrap()
            .args(["-q", "--max-redirects", "2", &url])
            .assert()
    })
    .await
    .unwrap();
    assert
        .failure()
        .stderr(predicate::str::contains("redirect"));
}

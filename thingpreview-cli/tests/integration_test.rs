//! End-to-end tests for the thingpreview CLI
//!
//! These tests only use keys outside the supported domains, so no search
//! request is ever sent and no network access is needed.

use std::fs;
use std::process::Command;

fn thingpreview() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_thingpreview"));
    // Unroutable backend: any accidental lookup fails fast instead of hanging
    cmd.env("THINGPREVIEW_BASE_URL", "http://127.0.0.1:1")
        .env("THINGPREVIEW_HTTP_TIMEOUT_SECS", "2")
        .env_remove("THINGPREVIEW_DEBOUNCE_MS")
        .env_remove("THINGPREVIEW_RETRY_BACKOFF_MS")
        .env_remove("THINGPREVIEW_RETRY_ATTEMPTS");
    cmd
}

/// Test `thingpreview --help`
#[test]
fn test_help() {
    let output = thingpreview().arg("--help").output().expect("Failed to run thingpreview --help");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("resolve"), "Missing resolve subcommand");
    assert!(stdout.contains("scan"), "Missing scan subcommand");
}

/// Test that unsupported keys resolve to null without a lookup
#[test]
fn test_resolve_unsupported_keys() {
    let output = thingpreview()
        .args(["--window-ms", "10", "resolve", "/subjects/love", "/lists/OL1L"])
        .output()
        .expect("Failed to run thingpreview resolve");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("stdout: {}", stdout);
    println!("stderr: {}", stderr);

    assert!(output.status.success(), "Command failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(stdout.trim()).expect("Invalid JSON output");
    assert_eq!(json["/subjects/love"], serde_json::Value::Null);
    assert_eq!(json["/lists/OL1L"], serde_json::Value::Null);
}

/// Test `thingpreview scan` on a page with well-formed and malformed placeholders
#[test]
fn test_scan_markup_file() {
    let path = std::env::temp_dir().join(format!("thingpreview_scan_{}.html", std::process::id()));
    fs::write(
        &path,
        r#"<ul>
             <li class="lazy-thing-preview" data-key="/subjects/love" data-render="title"></li>
             <li class="lazy-thing-preview" data-render="title"></li>
             <li class="lazy-thing-preview" data-key="/lists/OL1L" data-render="json"></li>
             <li class="lazy-thing-preview" data-key="/lists/OL2L" data-render="renderCarousel"></li>
           </ul>"#,
    )
    .expect("Failed to write markup file");

    let output = thingpreview()
        .args(["--window-ms", "10", "scan"])
        .arg(&path)
        .output()
        .expect("Failed to run thingpreview scan");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("stdout: {}", stdout);
    println!("stderr: {}", stderr);

    assert!(output.status.success(), "Command failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["[0] /subjects/love => (unavailable)", "[2] /lists/OL1L => null"]
    );

    let _ = fs::remove_file(&path);
}

/// Test that a missing file is reported as an error
#[test]
fn test_scan_missing_file() {
    let output = thingpreview()
        .args(["scan", "/nonexistent/thingpreview/page.html"])
        .output()
        .expect("Failed to run thingpreview scan");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read"), "Missing context in error: {}", stderr);
}

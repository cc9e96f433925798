//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use pipe_shell::cli::{parse_args_from, Args};
use pipe_shell::config::{Config, ConfigError};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("pipe-shell")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.shell.is_none());
    assert!(result.cwd.is_none());
    assert!(result.config.is_none());
    assert!(result.log_level.is_none());
    assert!(!result.serve);
    assert!(!result.help);
    assert!(!result.version);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-s",
        "/bin/bash",
        "-C",
        "/tmp",
        "-l",
        "debug",
        "--serve",
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
    ]))
    .unwrap();

    assert_eq!(result.shell, Some("/bin/bash".to_string()));
    assert_eq!(result.cwd, Some(PathBuf::from("/tmp")));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert!(result.serve);
    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
}

#[test]
fn test_cli_rejects_port_out_of_range() {
    let err = parse_args_from(args(&["-p", "70000"])).unwrap_err();
    assert_eq!(err.to_string(), "invalid value for --port: '70000'");
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_load_without_file_uses_defaults() {
    let config = Config::load(&Args::default()).unwrap();

    assert_eq!(config.shell.exit_command, "exit");
    assert_eq!(config.shell.warmup_ms, 100);
}

#[test]
fn test_load_file_then_args() {
    let file = config_file(
        r#"{
            "shell": {"program": "/bin/dash", "working_dir": "/var"},
            "server": {"port": 9000},
            "logging": {"level": "warn"}
        }"#,
    );

    let parsed = parse_args_from(args(&[
        "-c",
        file.path().to_str().unwrap(),
        "-C",
        "/tmp",
        "-l",
        "trace",
    ]))
    .unwrap();
    let config = Config::load(&parsed).unwrap();

    // Arguments win over the file
    assert_eq!(config.shell.working_dir, Some(PathBuf::from("/tmp")));
    assert_eq!(config.log_filter(), "trace");
    // The file wins over defaults
    assert_eq!(config.server.port, 9000);
}

#[test]
fn test_load_reports_bad_file() {
    let file = config_file("[1, 2");
    let parsed = parse_args_from(args(&["-c", file.path().to_str().unwrap()])).unwrap();

    let err = Config::load(&parsed).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_session_config_from_file() {
    let file = config_file(
        r#"{
            "shell": {
                "program": "/bin/sh",
                "exit_command": "exit 0",
                "warmup_ms": 0,
                "exit_timeout_ms": 100,
                "terminate_timeout_ms": 200
            }
        }"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    let session = config.to_session_config();

    assert_eq!(session.shell, "/bin/sh");
    assert_eq!(session.exit_command, "exit 0");
    assert_eq!(session.warmup, Duration::ZERO);
    assert_eq!(session.exit_timeout, Duration::from_millis(100));
    assert_eq!(session.terminate_timeout, Duration::from_millis(200));
}

#[test]
fn test_server_config_from_args() {
    let parsed = parse_args_from(args(&["-H", "10.1.2.3", "-p", "4444"])).unwrap();
    let mut config = Config::default();
    config.apply_args(&parsed);

    let server = config.to_server_config().unwrap();
    assert_eq!(server.bind_address(), "10.1.2.3:4444");
}

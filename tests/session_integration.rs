//! Session integration tests against a real `/bin/sh`.

#![cfg(unix)]

use std::time::{Duration, Instant};

use pipe_shell::{
    OutputKind, PipeShellError, SessionConfig, SessionState, ShellOutputRecord, ShellSession,
};

const WAIT: Duration = Duration::from_secs(10);

fn session() -> ShellSession {
    ShellSession::with_config(SessionConfig {
        warmup: Duration::from_millis(50),
        exit_timeout: Duration::from_millis(500),
        terminate_timeout: Duration::from_millis(500),
        join_timeout: Duration::from_millis(500),
        ..SessionConfig::default()
    })
}

fn lines(records: &[ShellOutputRecord], kind: OutputKind) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.data.clone())
        .collect()
}

/// Drain until a record of `kind` shows up or `WAIT` passes.
fn drain_until(session: &ShellSession, kind: OutputKind) -> Vec<ShellOutputRecord> {
    let deadline = Instant::now() + WAIT;
    let mut records = Vec::new();
    while Instant::now() < deadline {
        records.extend(session.drain_output());
        if records.iter().any(|r| r.kind == kind) {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    records
}

#[test]
fn test_echo_hello() {
    let session = session();
    session.start().unwrap();

    let handle = session.run("echo hello").unwrap();
    assert!(session.wait_idle(Some(&handle), WAIT));

    let records = session.drain_output();
    assert_eq!(records[0], ShellOutputRecord::input("echo hello"));
    assert_eq!(lines(&records, OutputKind::StandardOutput), vec!["hello"]);
    assert!(records.iter().all(|r| !r.data.contains(handle.as_str())));
    assert!(!session.is_busy(None));

    session.stop().unwrap();
}

#[test]
fn test_back_to_back_commands() {
    let session = session();
    session.start().unwrap();

    let a = session.run("echo a").unwrap();
    let b = session.run("echo b").unwrap();
    assert_ne!(a, b);
    assert!(session.wait_idle(None, WAIT));

    let records = session.drain_output();
    assert_eq!(lines(&records, OutputKind::StandardOutput), vec!["a", "b"]);
    assert_eq!(
        lines(&records, OutputKind::InputEcho),
        vec!["echo a", "echo b"]
    );
}

#[test]
fn test_shell_state_persists() {
    let session = session();
    session.start().unwrap();

    session.run("cd /").unwrap();
    session.run("PIPE_SHELL_VAR=kept").unwrap();
    session.run("pwd").unwrap();
    session.run("echo $PIPE_SHELL_VAR").unwrap();
    assert!(session.wait_idle(None, WAIT));

    let records = session.drain_output();
    assert_eq!(lines(&records, OutputKind::StandardOutput), vec!["/", "kept"]);
}

#[test]
fn test_stderr_and_failing_commands() {
    let session = session();
    session.start().unwrap();

    let handle = session.run("echo oops 1>&2; false").unwrap();
    assert!(session.wait_idle(Some(&handle), WAIT));

    // The stderr reader has no marker of its own
    let records = drain_until(&session, OutputKind::StandardError);
    assert!(lines(&records, OutputKind::StandardError).contains(&"oops".to_string()));
}

#[test]
fn test_output_without_trailing_newline() {
    let session = session();
    session.start().unwrap();

    let handle = session.run("printf abc").unwrap();
    assert!(session.wait_idle(Some(&handle), WAIT));

    let records = session.drain_output();
    assert_eq!(lines(&records, OutputKind::StandardOutput), vec!["abc"]);
    assert!(records.iter().all(|r| !r.data.contains(handle.as_str())));
}

#[test]
fn test_syntax_error_keeps_shell() {
    let session = session();
    session.start().unwrap();

    let rejected = session.run("fi").unwrap();
    // The shell discards input it had already buffered with the bad line
    let mut records = drain_until(&session, OutputKind::StandardError);
    assert!(!lines(&records, OutputKind::StandardError).is_empty());

    let handle = session.run("echo after").unwrap();
    assert!(session.wait_idle(Some(&handle), WAIT));
    records.extend(session.drain_output());

    assert!(session.is_alive());
    assert!(lines(&records, OutputKind::StandardOutput).contains(&"after".to_string()));
    // The rejected line never echoed its marker; the next one covers it
    assert!(!session.is_busy(Some(&rejected)));
    assert!(!session.is_busy(None));
}

#[test]
fn test_double_start_keeps_process() {
    let session = session();
    session.start().unwrap();
    let pid = session.pid();

    session.start().unwrap();

    assert_eq!(session.pid(), pid);
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn test_run_while_stopped() {
    let session = session();

    let err = session.run("echo hello").unwrap_err();

    assert!(matches!(err, PipeShellError::ProcessNotRunning));
    assert!(session.busy_commands().is_empty());
    assert!(session.drain_output().is_empty());
}

#[test]
fn test_out_of_band_kill() {
    let session = session();
    session.start().unwrap();
    let pid = session.pid().unwrap();

    let status = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + WAIT;
    while session.is_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!session.is_alive());

    let err = session.run("echo hello").unwrap_err();
    assert!(err.is_recoverable());
    assert!(session.wait_idle(None, WAIT));

    // The session can be brought back
    session.start().unwrap();
    assert_ne!(session.pid(), Some(pid));
    let handle = session.run("echo back").unwrap();
    assert!(session.wait_idle(Some(&handle), WAIT));
}

#[test]
fn test_stop_with_busy_command_is_bounded() {
    let session = session();
    session.start().unwrap();
    let handle = session.run("sleep 30").unwrap();
    assert!(session.is_busy(Some(&handle)));

    let started = Instant::now();
    session.stop().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!session.is_busy(None));
    assert!(session.pid().is_none());
}

#[test]
fn test_restart_after_stop() {
    let session = session();
    session.start().unwrap();
    let first = session.run("echo one").unwrap();
    assert!(session.wait_idle(Some(&first), WAIT));
    session.stop().unwrap();

    session.start().unwrap();
    let second = session.run("echo two").unwrap();
    assert!(session.wait_idle(Some(&second), WAIT));

    assert!(second.sequence() > first.sequence());
    let log = session.status_log().entries();
    assert_eq!(
        log.iter().filter(|l| l.starts_with("persistent shell started")).count(),
        2
    );
}

//! pipe-shell binary entry point.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use pipe_shell::api::{self, AppState};
use pipe_shell::cli;
use pipe_shell::config::Config;
use pipe_shell::{logging, OutputKind, ShellSession};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'pipe-shell --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // A subscriber may already be installed; keep going either way.
    let _ = logging::init_with_filter(config.log_filter());
    info!("pipe-shell v{}", env!("CARGO_PKG_VERSION"));

    let session = Arc::new(ShellSession::with_config(config.to_session_config()));

    let result = if args.serve {
        serve(&config, session).await
    } else {
        let idle_wait = config.shell.idle_wait();
        tokio::task::spawn_blocking(move || prompt(&session, idle_wait))
            .await
            .unwrap_or_else(|e| Err(pipe_shell::PipeShellError::Io(io::Error::other(e))))
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: &Config, session: Arc<ShellSession>) -> pipe_shell::Result<()> {
    let server_config = config
        .to_server_config()
        .map_err(|e| pipe_shell::PipeShellError::Io(io::Error::other(e.to_string())))?;

    let state = AppState::new(session);
    state
        .blocking(|s| s.start())
        .await
        .map_err(|(_, body)| pipe_shell::PipeShellError::Io(io::Error::other(body.0.message)))?;

    api::serve_with_state(server_config, state).await
}

/// Interactive line loop: each line runs in the persistent shell.
fn prompt(session: &ShellSession, idle_wait: std::time::Duration) -> pipe_shell::Result<()> {
    session.start()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim_end_matches(['\r', '\n']);
        if matches!(command.trim(), "exit" | "quit") {
            break;
        }

        match session.run(command) {
            Ok(handle) => {
                if !session.wait_idle(Some(&handle), idle_wait) {
                    eprintln!("(still running: {})", handle);
                }
            }
            Err(e) if e.is_recoverable() => {
                eprintln!("error: {}", e);
                eprintln!("restarting shell");
                session.stop()?;
                session.start()?;
            }
            Err(e) => eprintln!("error: {}", e),
        }

        for record in session.drain_output() {
            if record.kind != OutputKind::InputEcho {
                println!("{}", record);
            }
        }
    }

    session.stop()
}

//! Configuration management for pipe-shell.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cli::Args;
use crate::process::{default_shell, default_shell_args, default_shell_env};
use crate::session::SessionConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell process configuration.
    pub shell: ShellSection,
    /// Server configuration.
    pub server: ServerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Shell process configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Interpreter program.
    pub program: String,
    /// Arguments passed to the interpreter.
    pub args: Vec<String>,
    /// Working directory of the interpreter.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Line that asks the interpreter to exit.
    pub exit_command: String,
    /// Start-up output window in milliseconds.
    pub warmup_ms: u64,
    /// Grace period after the exit command, in milliseconds.
    pub exit_timeout_ms: u64,
    /// Grace period after terminating, in milliseconds.
    pub terminate_timeout_ms: u64,
    /// Reader join timeout on stop, in milliseconds.
    pub join_timeout_ms: u64,
    /// How long the interactive prompt waits for a command, in milliseconds.
    pub idle_wait_ms: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            program: default_shell().to_string(),
            args: default_shell_args(),
            working_dir: None,
            env: default_shell_env(),
            exit_command: "exit".to_string(),
            warmup_ms: 100,
            exit_timeout_ms: 5000,
            terminate_timeout_ms: 5000,
            join_timeout_ms: 2000,
            idle_wait_ms: 30_000,
        }
    }
}

impl ShellSection {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = var("PIPE_SHELL_SHELL").filter(|s| !s.is_empty()) {
            self.shell.program = shell;
        }

        if let Some(host) = var("PIPE_SHELL_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("PIPE_SHELL_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(level) = var("PIPE_SHELL_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref shell) = args.shell {
            self.shell.program = shell.clone();
        }

        if let Some(ref dir) = args.cwd {
            self.shell.working_dir = Some(dir.clone());
        }

        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Session settings for the configured shell.
    pub fn to_session_config(&self) -> SessionConfig {
        let shell = &self.shell;
        SessionConfig {
            shell: shell.program.clone(),
            args: shell.args.clone(),
            working_dir: shell.working_dir.clone(),
            env: shell.env.clone(),
            exit_command: shell.exit_command.clone(),
            warmup: Duration::from_millis(shell.warmup_ms),
            exit_timeout: Duration::from_millis(shell.exit_timeout_ms),
            terminate_timeout: Duration::from_millis(shell.terminate_timeout_ms),
            join_timeout: Duration::from_millis(shell.join_timeout_ms),
        }
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
        }
    }
}

impl std::error::Error for ConfigError {}

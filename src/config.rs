//! Configuration loaded from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `PREDB_LOG_LEVEL` | `info` |
//! | `PREDB_LOG_FORMAT` | `pretty` (`json` for structured logs) |
//! | `PREDB_WORKERS` | `0` (one per core) |
//! | `PREDB_TIMEOUT_MS` | `2500` |
//! | `PREDB_ENGINE_PROB`, `PREDB_ENGINE_KODKOD`, `PREDB_ENGINE_Z3`, `PREDB_ENGINE_SMT` | unset |
//!
//! A `.env` file in the working directory is loaded first when present.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::backend::{BackendKind, EngineCommand};
use crate::{Error, Result};

/// Default per-backend timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2500;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging setup
    pub logging: LoggingConfig,
    /// Worker threads for file-level parallelism (0 = one per core)
    pub workers: usize,
    /// Per-backend timeout
    pub timeout: Duration,
    /// Engine commands per backend kind
    pub engine: EngineConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable
    Pretty,
    /// One JSON object per event
    Json,
}

/// Engine command lines per backend kind
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    commands: BTreeMap<BackendKind, EngineCommand>,
}

impl EngineConfig {
    /// Register the command of a backend kind.
    #[must_use]
    pub fn with_command(mut self, kind: BackendKind, command: EngineCommand) -> Self {
        self.commands.insert(kind, command);
        self
    }

    /// Get the command of a backend kind.
    #[must_use]
    pub fn command(&self, kind: BackendKind) -> Option<&EngineCommand> {
        self.commands.get(&kind)
    }

    /// Iterate over the configured commands.
    pub fn commands(&self) -> impl Iterator<Item = (BackendKind, &EngineCommand)> {
        self.commands.iter().map(|(kind, cmd)| (*kind, cmd))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            workers: 0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed values
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let logging = LoggingConfig {
            level: lookup("PREDB_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: match lookup("PREDB_LOG_FORMAT")
                .unwrap_or_else(|| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(Error::Config(format!(
                        "PREDB_LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
                    )))
                }
            },
        };

        let workers = parse_number(&lookup, "PREDB_WORKERS")?.unwrap_or(0);
        let timeout = parse_number(&lookup, "PREDB_TIMEOUT_MS")?
            .map_or(defaults.timeout, Duration::from_millis);

        let mut engine = EngineConfig::default();
        for kind in BackendKind::ALL {
            let key = format!("PREDB_ENGINE_{}", kind.keyword());
            if let Some(line) = lookup(&key) {
                let command = EngineCommand::parse(&line)
                    .map_err(|e| Error::Config(format!("{key}: {e}")))?;
                engine = engine.with_command(kind, command);
            }
        }

        Ok(Self {
            logging,
            workers,
            timeout,
            engine,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} must be a number, got '{value}'")))
        })
        .transpose()
}

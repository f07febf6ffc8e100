#![forbid(unsafe_code)]

//! Global tracing subscriber bootstrap.
//!
//! Libraries in this workspace only emit `tracing` events. Binaries and test
//! harnesses that want them printed call [`init`] once at startup.
//!
//! # Environment Variables
//!
//! | Variable | Meaning |
//! |---|---|
//! | `PRESAGE_LOG` | Filter directives, e.g. `presage_predict=debug` |
//! | `RUST_LOG` | Fallback filter when `PRESAGE_LOG` is unset |
//! | `PRESAGE_LOG_FORMAT` | `json` for JSON lines, anything else for text |

use std::env;
use std::fmt;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when neither `PRESAGE_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Subscriber settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// Resolve settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("PRESAGE_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = match lookup("PRESAGE_LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self { filter, format }
    }
}

/// Error returned by [`init`].
#[derive(Debug)]
pub enum LogInitError {
    /// The filter directives did not parse.
    InvalidFilter(String),
    /// A global tracing subscriber is already installed.
    SubscriberAlreadySet,
}

impl fmt::Display for LogInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::SubscriberAlreadySet => write!(f, "a global tracing subscriber is already set"),
        }
    }
}

impl std::error::Error for LogInitError {}

/// Install a global subscriber configured from the environment.
pub fn init() -> Result<(), LogInitError> {
    init_with(&LogConfig::from_env())
}

/// Install a global subscriber with explicit settings.
pub fn init_with(config: &LogConfig) -> Result<(), LogInitError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| LogInitError::InvalidFilter(e.to_string()))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Json => builder.json().finish().try_init(),
        LogFormat::Text => builder.finish().try_init(),
    };
    installed.map_err(|_| LogInitError::SubscriberAlreadySet)?;
    tracing::debug!(filter = %config.filter, format = ?config.format, "logging installed");
    Ok(())
}

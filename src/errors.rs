//! AutoTest error handling.
//!
//! Two families of failure exist and they are deliberately kept apart:
//!
//! - [`AutoTestError`] covers everything that is fatal and visible: malformed
//!   configuration, report sinks that cannot write, key material that cannot be
//!   read. These propagate out of the engine with `?`.
//! - [`StepError`] / [`CapturedError`] cover failures raised by user supplied
//!   step functions. These are recovered locally by the run loop and recorded
//!   per target; they never leave [`crate::Test::run`].

use std::{fmt, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutoTestError>;

/// Fatal errors raised by construction, configuration and report sinks.
#[derive(Debug, Error, Diagnostic)]
pub enum AutoTestError {
    #[error("Configuration error: {message}")]
    #[diagnostic(code(autotest::configuration))]
    Configuration { message: String },

    #[error("Failed to write report row to {}", path.display())]
    #[diagnostic(
        code(autotest::sink),
        help("check that the report directory exists and is writable")
    )]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in report {}", path.display())]
    #[diagnostic(code(autotest::csv))]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to {action} {}: {detail}", dir.display())]
    #[diagnostic(
        code(autotest::mount),
        help("auto mount requires an fstab entry for the report directory")
    )]
    Mount {
        action: &'static str,
        dir: PathBuf,
        detail: String,
    },

    #[error("Row encryption error: {0}")]
    #[diagnostic(code(autotest::crypto))]
    Crypto(String),

    #[error("Invalid key in {}: {reason}", path.display())]
    #[diagnostic(
        code(autotest::key),
        help("keys are 32 bytes, hex encoded; generate a pair with `autotest keygen`")
    )]
    Key { path: PathBuf, reason: String },

    #[error("Failed to read operator input")]
    #[diagnostic(code(autotest::prompt))]
    Prompt(#[source] std::io::Error),

    #[error("Failed to load station config {}", path.display())]
    #[diagnostic(code(autotest::config_file))]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot identify station from interface '{interface}': {reason}")]
    #[diagnostic(
        code(autotest::station),
        help("set test.station_id in the station config, or pick another interface")
    )]
    Station { interface: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(autotest::io))]
    Io(#[from] std::io::Error),
}

impl AutoTestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AutoTestError::Configuration {
            message: message.into(),
        }
    }

    /// True for errors the engine raises eagerly at construction time.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AutoTestError::Configuration { .. })
    }
}

/// Error type returned by step functions.
///
/// Any `std::error::Error` converts into it with `?`, and plain strings work
/// too (`Err("no response from DUT".into())`).
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a step function returns.
pub type StepResult = std::result::Result<(), StepError>;

/// A step failure as recorded on a target.
///
/// Holds a rendered message and a trace. The original error is not kept so
/// that every target of a grouped step owns an independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    kind: String,
    message: String,
    trace: String,
}

impl CapturedError {
    /// Captures a returned step error along with its `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = format!("Error: {}", error);
        let mut cause = error.source();
        while let Some(inner) = cause {
            trace.push_str(&format!("\nCaused by: {}", inner));
            cause = inner.source();
        }
        Self {
            kind: "StepError".to_string(),
            message: error.to_string(),
            trace,
        }
    }

    /// Captures a panic payload raised inside a step function.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "step function panicked".to_string()
        };
        Self {
            kind: "Panic".to_string(),
            trace: format!("Panic: {}", message),
            message,
        }
    }

    /// Short classification: `StepError` or `Panic`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

//! Error types shared by the engine, the script interpreter and the console.

use thiserror::Error;

/// Everything that can go wrong while driving the turtle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurtleError {
    /// A distance, angle, coordinate or width was NaN or infinite.
    #[error("Non-finite {what}: {value}")]
    NonFinite {
        /// Which quantity was rejected.
        what: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Line widths must be positive and finite.
    #[error("Invalid line width {0}")]
    InvalidWidth(f64),

    /// Drawing area dimensions must be positive.
    #[error("Invalid drawing area {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Render scale must be at least 1.
    #[error("Invalid render scale {0}")]
    InvalidScale(u32),

    /// A single forward move needed more wrap steps than allowed.
    #[error("Forward move did not settle after {steps} wrap steps")]
    WrapLimitExceeded { steps: usize },

    /// A font description could not be parsed.
    #[error("Invalid font '{0}'")]
    InvalidFont(String),

    /// The console script could not be parsed.
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A script called a procedure that was never defined.
    #[error("Unknown procedure '{0}'")]
    UnknownProcedure(String),

    /// Procedure calls nested deeper than the interpreter allows.
    #[error("Procedure calls nested deeper than {0}")]
    RecursionLimit(usize),

    /// Producing the PNG image failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Configuration file or value rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error, flattened to a message so the error stays `Clone`.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TurtleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TurtleError>;

/// Rejects NaN and infinities before they reach turtle state.
pub(crate) fn ensure_finite(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TurtleError::NonFinite { what, value })
    }
}

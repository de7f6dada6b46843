//! Error types for vp8lite

use thiserror::Error;

/// Result type alias for vp8lite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vp8lite
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container format error
    #[error("Format error: {0}")]
    Format(String),

    /// The bitstream is corrupt or truncated
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    /// The bitstream is valid but uses a feature this codec does not implement
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A decoded value is outside any plausible range
    #[error("Numeric guard: {0}")]
    NumericGuard(String),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// End of stream
    #[error("End of stream")]
    EndOfStream,

    /// Try again later
    #[error("Try again")]
    TryAgain,

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create a malformed stream error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedStream(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a numeric guard error
    pub fn numeric_guard<S: Into<String>>(msg: S) -> Self {
        Error::NumericGuard(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// True for corrupt or truncated bitstreams
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedStream(_))
    }

    /// True for valid bitstreams using features outside this codec
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}

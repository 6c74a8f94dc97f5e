//! Error types for the volume permissions injector

use thiserror::Error;

/// Main error type for injector operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The init-container configuration document could not be parsed or is incomplete
    #[error("parse error: {0}")]
    Parse(String),

    /// A patch value or the patch document could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid startup configuration (template, TLS material)
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to read a file named on the command line
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTPS server failed
    #[error("server error: {0}")]
    Server(String),
}

impl Error {
    /// Create a parse error with the given message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a server error with the given message
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

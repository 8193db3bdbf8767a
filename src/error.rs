//! Error types for xmltext operations.

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// XML text that could not be turned into a [`Document`](crate::dom::Document).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("XML parse error at byte {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: u64,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Failure inside the structural conversion chain.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("stylesheet {path}: {message}")]
    Stylesheet { path: String, message: String },

    #[error("stylesheet engine unavailable: {0}")]
    Engine(String),

    #[error("{stage} produced malformed XML: {source}")]
    Malformed {
        stage: String,
        #[source]
        source: ParseError,
    },
}

/// Fatal conversion failure, carrying every diagnostic emitted before it.
#[derive(Error, Debug)]
#[error("unable to convert rich text: {source}")]
pub struct ConvertError {
    #[source]
    pub source: TransformError,
    pub diagnostics: Vec<Diagnostic>,
}

/// Errors that can occur outside the conversion pipeline itself.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "cli")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

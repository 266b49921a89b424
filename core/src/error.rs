//! Error types for the request shell core.
//!
//! # Design
//! One enum covers marshalling, URL building, dispatch and persistence.
//! Marshalling and URL errors are pure values: producing one never touches
//! the live context. The command surface turns every variant into a script
//! runtime error carrying the `Display` text.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A value outside {null, bool, number, string, map} was met while
    /// converting. The string names the offending key path and type.
    #[error("unsupported value: {0}")]
    UnsupportedType(String),

    /// The context cannot be turned into a request URL.
    #[error("context cannot build a request url")]
    InvalidContext,

    /// Only GET, POST, PUT and DELETE are dispatched.
    #[error("unsupported method {0:?}, expected GET|POST|PUT|DELETE")]
    UnsupportedMethod(String),

    /// Network or timeout failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Save refused because the target exists and overwrite was not requested.
    #[error("{} exists", .0.display())]
    FileExists(PathBuf),

    #[error("{} not found", .0.display())]
    FileNotFound(PathBuf),

    /// A setting from the environment or command line could not be used.
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the script runtime while evaluating user code.
    #[error("{0}")]
    Script(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Box<rhai::EvalAltResult>> for Error {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        Error::Script(err.to_string())
    }
}

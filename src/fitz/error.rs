//! Error handling

use std::io;
use thiserror::Error;

/// The main error type for pdfwrite operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Generic(String),
    #[error("System error: {0}")]
    System(#[from] io::Error),
    #[error("Invalid argument: {0}")]
    Argument(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Format error: {0}")]
    Format(String),
    #[error("Syntax error: {0}")]
    Syntax(String),
    /// The input is incomplete and the operation should be retried once more
    /// data is available. Never recovered from inside the writer; always
    /// propagated to the caller unchanged.
    #[error("Data not available yet, try again later")]
    TryLater,
}

impl Error {
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        Error::Argument(msg.into())
    }
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
    pub fn syntax<S: Into<String>>(msg: S) -> Self {
        Error::Syntax(msg.into())
    }

    /// True for the retry-later regime, which recovery sites must re-raise.
    pub fn is_try_later(&self) -> bool {
        matches!(self, Error::TryLater)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_generic() {
        let e = Error::generic("test error");
        assert!(matches!(e, Error::Generic(_)));
        assert_eq!(format!("{}", e), "test error");
    }

    #[test]
    fn test_error_argument() {
        let e = Error::argument("bad combination");
        assert!(matches!(e, Error::Argument(_)));
        assert!(format!("{}", e).contains("bad combination"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::System(_)));
        assert!(format!("{}", e).contains("file not found"));
    }

    #[test]
    fn test_try_later() {
        assert!(Error::TryLater.is_try_later());
        assert!(!Error::generic("x").is_try_later());
    }
}

//! Error types for oxsftp-core.

use thiserror::Error;

/// Main error type for engine operations.
///
/// These are *stream-level* errors: anything that makes the connection
/// unusable. Per-request problems (short fields, unknown commands, handler
/// failures) are reported to the peer as STATUS responses and never surface
/// here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer violated the framing layer; stream sync is lost.
    #[error("framing error: {message}")]
    Framing { message: String },

    /// Bad configuration at startup.
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_framing() {
        let err = Error::Framing {
            message: "zero-length packet".into(),
        };
        assert_eq!(err.to_string(), "framing error: zero-length packet");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at component boundaries (CLI parsing, transport bind).
///
/// Internal component-to-component signaling uses narrower outcome types
/// instead of this enum; see [`crate::verdict`] and the probe outcome types
/// in `natchk-client`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    pub fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

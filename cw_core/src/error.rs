/// Core error type for crowdwatch
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot open source: {0}")]
    CannotOpen(String),

    #[error("transient read failure: {0}")]
    TransientRead(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Sink delivery failure: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

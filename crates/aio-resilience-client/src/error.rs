use thiserror::Error;

/// Construction-time errors raised by [`crate::ClientBuilder::build`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    #[error("timeout must be positive")]
    NonPositiveTimeout,
}

use http::Method;
use thiserror::Error;

/// Programming errors in how strategies were wired together. These indicate
/// a misconfigured client, not a network or server failure.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no strategy configured for HTTP method {0}")]
    UnmappedMethod(Method),
}

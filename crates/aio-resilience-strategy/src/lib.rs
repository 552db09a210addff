//! Multi-attempt request strategies, composed on top of the pipeline's
//! terminal continuation.

mod error;
mod scoped;
mod strategy;

pub use error::StrategyError;
pub use scoped::ScopedResponse;
pub use strategy::{MaxConcurrency, MethodBased, Parallel, RequestStrategy, RetryUntilDeadlineExpired, Sequential, SendAttemptFn, SingleAttempt};

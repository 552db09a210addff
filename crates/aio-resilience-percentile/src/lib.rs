//! A delay provider driven by recently-observed endpoint latency rather than
//! a fixed schedule.

mod error;
mod provider;

pub use error::PercentileDelayConfigError;
pub use provider::{PercentileDelayProvider, PercentileDelayProviderBuilder};

//! A facade client composing the pipeline, strategy and circuit breaker
//! crates into one entry point: `Client::builder(transport, endpoint)...build()`.

mod client;
mod endpoint;
mod error;

pub use client::{Client, ClientBuilder};
pub use endpoint::Endpoint;
pub use error::ClientError;

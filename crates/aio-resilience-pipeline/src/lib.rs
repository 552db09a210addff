//! The request pipeline: a chain of [`RequestModule`]s folded around a
//! [`Transport`], composed once per client and reused across every call.

mod module;
mod transport;

pub use module::{build_pipeline, BypassModule, CircuitBreakerModule, LowTimeoutModule, ModuleResponse, NextModuleFn, RequestEnricher, RequestModule, TransportModule};
pub use transport::Transport;

//! Core data model for resilient HTTP client orchestration.
//!
//! This crate has no opinion about transports, retries, or circuit breaking —
//! it supplies the value types and small traits every other crate in the
//! workspace builds on: [`Deadline`] and [`Priority`] propagation, the
//! ambient [`CallContext`], the [`Request`]/[`Response`] model, response
//! classification, delay/deadline providers, rolling metrics, and the
//! observability event system.

pub mod classifier;
pub mod context;
pub mod deadline;
pub mod deadline_provider;
pub mod delay;
pub mod error;
pub mod events;
pub mod metrics;
pub mod model;
pub mod priority;

pub use classifier::{DefaultResponseClassifier, FnClassifier, ResponseClassifier, ResponseVerdict};
pub use context::CallContext;
pub use deadline::Deadline;
pub use deadline_provider::{DeadlineProvider, PassThroughDeadline, SplitBetweenAttempts};
pub use delay::{ConstantDelay, DelayProvider, LinearDelay};
pub use error::CoreError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use metrics::{MetricsSnapshot, RollingMetrics};
pub use model::{header, EmptyResponse, Request, RequestBuilder, Response};
pub use priority::Priority;

use std::time::Duration;

use futures::future::BoxFuture;
use url::Url;

use aio_resilience_core::Request;

use crate::module::ModuleResponse;

/// The boundary between the pipeline and whatever actually puts bytes on the
/// wire. No concrete socket implementation lives in this crate; callers
/// supply their own (an HTTP client wrapper, a mock for tests, ...).
pub trait Transport: Send + Sync {
    fn send(&self, endpoint: Url, request: Request, timeout: Duration) -> BoxFuture<'static, ModuleResponse>;
}

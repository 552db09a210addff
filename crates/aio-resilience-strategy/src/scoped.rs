use std::future::Future;

use bytes::Bytes;
use http::HeaderMap;

use aio_resilience_core::{Response, ResponseVerdict};

/// Owns a produced response together with the verdict it was classified
/// with, and guarantees the response is closed exactly once, regardless of
/// how this value's lifetime ends.
///
/// `close` is async, so it can't run inside a plain `Drop` impl. Instead
/// `Drop` hands the response to a detached task on whatever runtime is
/// current, which is the synchronous action every strategy in this crate
/// relies on to survive cancellation: dropping the future that holds a
/// `ScopedResponse` still runs this `Drop` impl, even mid-`.await`.
pub struct ScopedResponse {
    response: Option<Box<dyn Response>>,
    verdict: ResponseVerdict,
}

impl ScopedResponse {
    pub fn new(response: Box<dyn Response>, verdict: ResponseVerdict) -> Self {
        Self { response: Some(response), verdict }
    }

    fn inner(&self) -> &dyn Response {
        self.response.as_deref().expect("response taken from a ScopedResponse still in scope")
    }

    pub fn verdict(&self) -> ResponseVerdict {
        self.verdict
    }

    pub fn status(&self) -> u16 {
        self.inner().status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner().headers()
    }

    pub fn elapsed(&self) -> f64 {
        self.inner().elapsed()
    }

    pub async fn read(&self) -> Bytes {
        self.inner().read().await
    }

    /// Runs `f` against the response, then closes it.
    pub async fn with<F, Fut, T>(self, f: F) -> T
    where
        F: FnOnce(&dyn Response) -> Fut,
        Fut: Future<Output = T>,
    {
        f(self.inner()).await
    }
}

impl Drop for ScopedResponse {
    fn drop(&mut self) {
        if let Some(response) = self.response.take() {
            close_in_background(response);
        }
    }
}

pub(crate) fn close_in_background(response: Box<dyn Response>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                response.close().await;
            });
        }
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("dropped a response with no tokio runtime available to close it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct TrackingResponse {
        closed: Arc<AtomicBool>,
        headers: HeaderMap,
    }

    impl TrackingResponse {
        fn new(closed: Arc<AtomicBool>) -> Self {
            Self { closed, headers: HeaderMap::new() }
        }
    }

    impl Response for TrackingResponse {
        fn status(&self) -> u16 {
            200
        }
        fn headers(&self) -> &HeaderMap {
            &self.headers
        }
        fn elapsed(&self) -> f64 {
            0.0
        }
        fn read(&self) -> BoxFuture<'_, Bytes> {
            Box::pin(async { Bytes::new() })
        }
        fn close(&self) -> BoxFuture<'_, ()> {
            let closed = Arc::clone(&self.closed);
            Box::pin(async move {
                closed.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn drop_closes_the_response_exactly_once() {
        let closed = Arc::new(AtomicBool::new(false));
        let scoped = ScopedResponse::new(Box::new(TrackingResponse::new(Arc::clone(&closed))), ResponseVerdict::Accept);
        drop(scoped);
        tokio::task::yield_now().await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn with_runs_closure_then_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let scoped = ScopedResponse::new(Box::new(TrackingResponse::new(Arc::clone(&closed))), ResponseVerdict::Accept);
        let status = scoped.with(|r| async move { r.status() }).await;
        assert_eq!(status, 200);
        tokio::task::yield_now().await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn verdict_is_retained() {
        let closed = Arc::new(AtomicBool::new(false));
        let scoped = ScopedResponse::new(Box::new(TrackingResponse::new(closed)), ResponseVerdict::Reject);
        assert_eq!(scoped.verdict(), ResponseVerdict::Reject);
    }
}

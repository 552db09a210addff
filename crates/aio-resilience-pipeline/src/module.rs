use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use aio_resilience_circuitbreaker::CircuitBreaker;
use aio_resilience_core::{header, Deadline, EmptyResponse, Priority, Request, Response, ResponseClassifier, ResponseVerdict};

use crate::transport::Transport;

pub type ModuleResponse = Box<dyn Response>;

/// The continuation a [`RequestModule`] hands control to.
pub type NextModuleFn = dyn Fn(Url, Request, Deadline, Priority) -> BoxFuture<'static, ModuleResponse> + Send + Sync;

/// One link in the request pipeline.
///
/// A module either short-circuits with a terminal response, or calls `next`
/// — possibly after rewriting `request`, `deadline` or `priority` — and
/// returns whatever `next` produces.
pub trait RequestModule: Send + Sync {
    fn execute(
        &self,
        next: Arc<NextModuleFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ModuleResponse>;

    /// Whether `build_pipeline` should elide this module entirely rather than
    /// fold it into the chain. Only [`BypassModule`] overrides this.
    fn is_bypass(&self) -> bool {
        false
    }
}

/// A pure passthrough to `next`. Never short-circuits and never mutates the
/// request on its own; useful as a placeholder slot in a module list that's
/// assembled conditionally. `build_pipeline` drops it instead of folding it
/// in, so it costs nothing at call time.
#[derive(Default)]
pub struct BypassModule;

impl RequestModule for BypassModule {
    fn execute(
        &self,
        next: Arc<NextModuleFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ModuleResponse> {
        next(endpoint, request, deadline, priority)
    }

    fn is_bypass(&self) -> bool {
        true
    }
}

fn do_not_retry_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(header::X_DO_NOT_RETRY), HeaderValue::from_static("1"));
    headers
}

fn numeric_header(value: impl std::fmt::Display) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Short-circuits with a synthetic 408 when a deadline has already expired,
/// or is too tight to possibly succeed, without ever reaching the network.
pub struct LowTimeoutModule {
    low_timeout_threshold: Duration,
}

impl LowTimeoutModule {
    pub fn new(low_timeout_threshold: Duration) -> Self {
        Self { low_timeout_threshold }
    }
}

impl RequestModule for LowTimeoutModule {
    fn execute(
        &self,
        next: Arc<NextModuleFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ModuleResponse> {
        let threshold = self.low_timeout_threshold;
        Box::pin(async move {
            if deadline.expired() || deadline.remaining() < threshold {
                return Box::new(EmptyResponse::with_headers(408, do_not_retry_headers())) as ModuleResponse;
            }
            next(endpoint, request, deadline, priority).await
        })
    }
}

pub type RequestEnricher = dyn Fn(Request, bool) -> BoxFuture<'static, Request> + Send + Sync;

/// Hands the request to a [`Transport`], optionally first stamping it with
/// the system headers (`X-Request-Deadline-At`, `X-Request-Timeout`,
/// `X-Request-Priority`) and running a caller-supplied enricher.
///
/// Terminal: never calls `next`.
pub struct TransportModule {
    transport: Arc<dyn Transport>,
    emit_system_headers: bool,
    request_enricher: Option<Arc<RequestEnricher>>,
}

impl TransportModule {
    pub fn new(transport: Arc<dyn Transport>, emit_system_headers: bool) -> Self {
        Self { transport, emit_system_headers, request_enricher: None }
    }

    pub fn with_request_enricher(mut self, enricher: Arc<RequestEnricher>) -> Self {
        self.request_enricher = Some(enricher);
        self
    }
}

impl RequestModule for TransportModule {
    fn execute(
        &self,
        _next: Arc<NextModuleFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ModuleResponse> {
        let transport = Arc::clone(&self.transport);
        let emit_system_headers = self.emit_system_headers;
        let enricher = self.request_enricher.clone();

        Box::pin(async move {
            let mut request = request;

            if emit_system_headers {
                let mut extra = HeaderMap::new();
                extra.insert(HeaderName::from_static(header::X_REQUEST_DEADLINE_AT), numeric_header(deadline));
                extra.insert(HeaderName::from_static(header::X_REQUEST_TIMEOUT), numeric_header(deadline.remaining().as_secs_f64()));
                extra.insert(HeaderName::from_static(header::X_REQUEST_PRIORITY), numeric_header(priority));
                request = request.update_headers(&extra);
            }

            if let Some(enricher) = enricher {
                request = enricher(request, emit_system_headers).await;
            }

            transport.send(endpoint, request, deadline.remaining()).await
        })
    }
}

/// Wraps the continuation with a per-endpoint [`CircuitBreaker`], falling
/// back to a synthetic response (carrying `X-Do-Not-Retry` and
/// `X-Circuit-Breaker`) when the breaker rejects the call.
pub struct CircuitBreakerModule {
    circuit_breaker: Arc<CircuitBreaker<Url>>,
    classifier: Arc<dyn ResponseClassifier>,
    fallback_status: u16,
    fallback_headers: HeaderMap,
}

impl CircuitBreakerModule {
    pub fn new(circuit_breaker: Arc<CircuitBreaker<Url>>, classifier: Arc<dyn ResponseClassifier>) -> Self {
        Self::with_status_code(circuit_breaker, classifier, 502)
    }

    pub fn with_status_code(circuit_breaker: Arc<CircuitBreaker<Url>>, classifier: Arc<dyn ResponseClassifier>, status_code: u16) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(header::X_DO_NOT_RETRY), HeaderValue::from_static("1"));
        headers.insert(HeaderName::from_static(header::X_CIRCUIT_BREAKER), HeaderValue::from_static("1"));
        Self { circuit_breaker, classifier, fallback_status: status_code, fallback_headers: headers }
    }
}

impl RequestModule for CircuitBreakerModule {
    fn execute(
        &self,
        next: Arc<NextModuleFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ModuleResponse> {
        let breaker = Arc::clone(&self.circuit_breaker);
        let classifier = Arc::clone(&self.classifier);
        let fallback = Box::new(EmptyResponse::with_headers(self.fallback_status, self.fallback_headers.clone())) as ModuleResponse;
        let scope = endpoint.clone();

        Box::pin(async move {
            breaker
                .execute(
                    scope,
                    move || next(endpoint, request, deadline, priority),
                    fallback,
                    move |r: &ModuleResponse| classifier.classify(r) == ResponseVerdict::Accept,
                )
                .await
        })
    }
}

/// Builds a pipeline by right-folding `modules` around a terminal function.
/// The terminal is only ever reached if the last module calls `next` instead
/// of returning a response of its own — a misconfigured pipeline, since
/// [`TransportModule`] and similar terminal modules never do.
pub fn build_pipeline(modules: Vec<Arc<dyn RequestModule>>) -> Arc<NextModuleFn> {
    let mut pipeline: Arc<NextModuleFn> =
        Arc::new(|_endpoint: Url, _request: Request, _deadline: Deadline, _priority: Priority| -> BoxFuture<'static, ModuleResponse> {
            Box::pin(async { panic!("request pipeline exhausted without reaching a terminal module") })
        });

    for module in modules.into_iter().rev() {
        if module.is_bypass() {
            continue;
        }
        let next = Arc::clone(&pipeline);
        pipeline = Arc::new(move |endpoint: Url, request: Request, deadline: Deadline, priority: Priority| {
            module.execute(Arc::clone(&next), endpoint, request, deadline, priority)
        });
    }

    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use aio_resilience_core::DefaultResponseClassifier;
    use futures::FutureExt;

    struct StubTransport {
        status: u16,
    }

    impl Transport for StubTransport {
        fn send(&self, _endpoint: Url, _request: Request, _timeout: Duration) -> BoxFuture<'static, ModuleResponse> {
            let status = self.status;
            Box::pin(async move { Box::new(EmptyResponse::new(status)) as ModuleResponse })
        }
    }

    fn endpoint() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    fn request() -> Request {
        Request::builder(http::Method::GET, endpoint()).build()
    }

    #[tokio::test]
    async fn low_timeout_module_short_circuits_when_deadline_too_tight() {
        let modules: Vec<Arc<dyn RequestModule>> = vec![
            Arc::new(LowTimeoutModule::new(Duration::from_secs(1))),
            Arc::new(TransportModule::new(Arc::new(StubTransport { status: 200 }), false)),
        ];
        let pipeline = build_pipeline(modules);

        let deadline = Deadline::from_timeout(Duration::from_millis(10));
        let response = pipeline(endpoint(), request(), deadline, Priority::Normal).await;
        assert_eq!(response.status(), 408);
        assert_eq!(response.headers().get(header::X_DO_NOT_RETRY).unwrap(), "1");
    }

    #[tokio::test]
    async fn low_timeout_module_passes_through_when_deadline_is_comfortable() {
        let modules: Vec<Arc<dyn RequestModule>> = vec![
            Arc::new(LowTimeoutModule::new(Duration::from_millis(1))),
            Arc::new(TransportModule::new(Arc::new(StubTransport { status: 200 }), true)),
        ];
        let pipeline = build_pipeline(modules);

        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        let response = pipeline(endpoint(), request(), deadline, Priority::Normal).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn circuit_breaker_module_falls_back_once_open() {
        use aio_resilience_circuitbreaker::CircuitBreakerConfig;

        let breaker = Arc::new(CircuitBreaker::new(
            CircuitBreakerConfig::builder().minimum_throughput(1).failure_threshold(0.5).build().unwrap(),
        ));
        let classifier: Arc<dyn ResponseClassifier> = Arc::new(DefaultResponseClassifier::default());
        let modules: Vec<Arc<dyn RequestModule>> = vec![
            Arc::new(CircuitBreakerModule::new(breaker, classifier)),
            Arc::new(TransportModule::new(Arc::new(StubTransport { status: 500 }), false)),
        ];
        let pipeline = build_pipeline(modules);

        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        let first = pipeline(endpoint(), request(), deadline, Priority::Normal).await;
        assert_eq!(first.status(), 500);

        let second = pipeline(endpoint(), request(), deadline, Priority::Normal).await;
        assert_eq!(second.status(), 502);
        assert_eq!(second.headers().get(header::X_CIRCUIT_BREAKER).unwrap(), "1");
    }

    #[tokio::test]
    async fn bypass_module_is_elided_and_never_seen_by_the_terminal() {
        let modules: Vec<Arc<dyn RequestModule>> = vec![
            Arc::new(BypassModule),
            Arc::new(TransportModule::new(Arc::new(StubTransport { status: 200 }), false)),
        ];
        let pipeline = build_pipeline(modules);

        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        let response = pipeline(endpoint(), request(), deadline, Priority::Normal).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn unconfigured_terminal_panics() {
        let pipeline = build_pipeline(Vec::new());
        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        let result = std::panic::AssertUnwindSafe(pipeline(endpoint(), request(), deadline, Priority::Normal))
            .catch_unwind()
            .await;
        assert!(result.is_err());
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use http::Method;
use url::Url;

use aio_resilience_circuitbreaker::CircuitBreaker;
use aio_resilience_core::{CallContext, Deadline, DefaultResponseClassifier, LinearDelay, Priority, Request, Response, ResponseClassifier, ResponseVerdict};
use aio_resilience_pipeline::{build_pipeline, CircuitBreakerModule, LowTimeoutModule, NextModuleFn, RequestEnricher, RequestModule, Transport, TransportModule};
use aio_resilience_strategy::{MethodBased, RequestStrategy, ScopedResponse, SendAttemptFn, Sequential, SingleAttempt};

use crate::endpoint::Endpoint;
use crate::error::ClientError;

/// A resilient HTTP client: a pre-built pipeline plus a method-dispatched
/// request strategy, composed once at construction and reused across every
/// call.
pub struct Client {
    endpoint: Endpoint,
    request_strategy: Arc<dyn RequestStrategy>,
    default_timeout: Duration,
    default_priority: Priority,
    send_attempt: Arc<SendAttemptFn>,
}

impl Client {
    pub fn builder(transport: Arc<dyn Transport>, endpoint: impl Into<Endpoint>) -> ClientBuilder {
        ClientBuilder::new(transport, endpoint.into())
    }

    /// Issues `request` using this client's default strategy, deadline and
    /// priority.
    pub async fn request(&self, request: Request) -> ScopedResponse {
        self.request_with(request, None, None, None).await
    }

    /// Issues `request`, overriding any of the default deadline, priority or
    /// strategy for this call only.
    ///
    /// The effective deadline is `deadline`, falling back to the ambient
    /// [`CallContext`]'s deadline, falling back to this client's default
    /// timeout. The effective priority composes the ambient context's
    /// priority with `priority` (or this client's default), the same way
    /// [`Priority::compose`] resolves a two-level disagreement to `Normal`.
    pub async fn request_with(
        &self,
        request: Request,
        deadline: Option<Deadline>,
        priority: Option<Priority>,
        strategy: Option<Arc<dyn RequestStrategy>>,
    ) -> ScopedResponse {
        let context = CallContext::current();

        let effective_deadline = deadline.or(context.deadline).unwrap_or_else(|| Deadline::from_timeout(self.default_timeout));

        let requested_priority = priority.unwrap_or(self.default_priority);
        let effective_priority = match context.priority {
            Some(context_priority) => Priority::compose(context_priority, requested_priority),
            None => requested_priority,
        };

        let endpoint = self.endpoint.resolve().await;
        let strategy = strategy.unwrap_or_else(|| Arc::clone(&self.request_strategy));

        strategy
            .request(Arc::clone(&self.send_attempt), endpoint, request, effective_deadline, effective_priority)
            .await
    }
}

/// Fluent builder for [`Client`], mirroring the pipeline/strategy crates'
/// "Default: X" builder idiom.
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    safe_method_strategy: Option<Arc<dyn RequestStrategy>>,
    unsafe_method_strategy: Option<Arc<dyn RequestStrategy>>,
    classifier: Arc<dyn ResponseClassifier>,
    timeout: Duration,
    priority: Priority,
    low_timeout_threshold: Duration,
    emit_system_headers: bool,
    request_enricher: Option<Arc<RequestEnricher>>,
    circuit_breaker: Option<Arc<CircuitBreaker<Url>>>,
}

impl ClientBuilder {
    fn new(transport: Arc<dyn Transport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
            safe_method_strategy: None,
            unsafe_method_strategy: None,
            classifier: Arc::new(DefaultResponseClassifier::default()),
            timeout: Duration::from_secs(20),
            priority: Priority::Normal,
            low_timeout_threshold: Duration::from_millis(5),
            emit_system_headers: true,
            request_enricher: None,
            circuit_breaker: None,
        }
    }

    /// Strategy used for `GET` requests.
    ///
    /// Default: `Sequential` with 3 attempts and a jittered linear delay.
    pub fn safe_method_strategy(mut self, strategy: Arc<dyn RequestStrategy>) -> Self {
        self.safe_method_strategy = Some(strategy);
        self
    }

    /// Strategy used for `POST`/`PUT`/`DELETE`/`PATCH` requests.
    ///
    /// Default: `SingleAttempt`.
    pub fn unsafe_method_strategy(mut self, strategy: Arc<dyn RequestStrategy>) -> Self {
        self.unsafe_method_strategy = Some(strategy);
        self
    }

    /// Default: [`DefaultResponseClassifier`].
    pub fn classifier(mut self, classifier: Arc<dyn ResponseClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Default timeout used to build a deadline when neither an explicit nor
    /// an ambient one is present.
    ///
    /// Default: 20 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default priority used when neither an explicit nor an ambient one is
    /// present.
    ///
    /// Default: `Normal`
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Threshold below which [`LowTimeoutModule`] short-circuits rather than
    /// issuing a call that cannot possibly succeed.
    ///
    /// Default: 5 milliseconds
    pub fn low_timeout_threshold(mut self, threshold: Duration) -> Self {
        self.low_timeout_threshold = threshold;
        self
    }

    /// Whether the transport module stamps `X-Request-Deadline-At`,
    /// `X-Request-Timeout` and `X-Request-Priority` onto outgoing requests.
    ///
    /// Default: `true`
    pub fn emit_system_headers(mut self, emit: bool) -> Self {
        self.emit_system_headers = emit;
        self
    }

    pub fn request_enricher(mut self, enricher: Arc<RequestEnricher>) -> Self {
        self.request_enricher = Some(enricher);
        self
    }

    /// Wraps the pipeline in a [`CircuitBreakerModule`] scoped per resolved
    /// endpoint URL.
    ///
    /// Default: none.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker<Url>>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        if self.timeout.is_zero() {
            return Err(ClientError::NonPositiveTimeout);
        }

        let safe_method_strategy = self
            .safe_method_strategy
            .unwrap_or_else(|| Arc::new(Sequential::new(3, Arc::new(LinearDelay::default()))));
        let unsafe_method_strategy = self.unsafe_method_strategy.unwrap_or_else(|| Arc::new(SingleAttempt));

        let mut strategy_by_method: HashMap<Method, Arc<dyn RequestStrategy>> = HashMap::new();
        strategy_by_method.insert(Method::GET, Arc::clone(&safe_method_strategy));
        strategy_by_method.insert(Method::POST, Arc::clone(&unsafe_method_strategy));
        strategy_by_method.insert(Method::PUT, Arc::clone(&unsafe_method_strategy));
        strategy_by_method.insert(Method::DELETE, Arc::clone(&unsafe_method_strategy));
        strategy_by_method.insert(Method::PATCH, unsafe_method_strategy);
        let request_strategy: Arc<dyn RequestStrategy> = Arc::new(MethodBased::new(strategy_by_method));

        let mut modules: Vec<Arc<dyn RequestModule>> = Vec::new();
        if let Some(breaker) = self.circuit_breaker {
            modules.push(Arc::new(CircuitBreakerModule::new(breaker, Arc::clone(&self.classifier))));
        }
        modules.push(Arc::new(LowTimeoutModule::new(self.low_timeout_threshold)));

        let mut transport_module = TransportModule::new(self.transport, self.emit_system_headers);
        if let Some(enricher) = self.request_enricher {
            transport_module = transport_module.with_request_enricher(enricher);
        }
        modules.push(Arc::new(transport_module));

        let pipeline: Arc<NextModuleFn> = build_pipeline(modules);
        let classifier = self.classifier;

        let send_attempt: Arc<SendAttemptFn> = Arc::new(move |endpoint, request, deadline, priority| {
            let pipeline = Arc::clone(&pipeline);
            let classifier = Arc::clone(&classifier);
            Box::pin(async move {
                let response = pipeline(endpoint, request, deadline, priority).await;
                let verdict = classifier.classify(response.as_ref());
                (response, verdict)
            }) as BoxFuture<'static, (Box<dyn Response>, ResponseVerdict)>
        });

        Ok(Client {
            endpoint: self.endpoint,
            request_strategy,
            default_timeout: self.timeout,
            default_priority: self.priority,
            send_attempt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aio_resilience_core::EmptyResponse;

    struct StubTransport {
        status: u16,
    }

    impl Transport for StubTransport {
        fn send(&self, _endpoint: Url, _request: Request, _timeout: Duration) -> BoxFuture<'static, Box<dyn Response>> {
            let status = self.status;
            Box::pin(async move { Box::new(EmptyResponse::new(status)) as Box<dyn Response> })
        }
    }

    fn endpoint() -> Url {
        Url::parse("https://example.com/widgets").unwrap()
    }

    #[tokio::test]
    async fn get_uses_the_safe_strategy_and_succeeds() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { status: 200 });
        let client = Client::builder(transport, endpoint()).build().unwrap();

        let request = Request::builder(Method::GET, endpoint()).build();
        let response = client.request(request).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn post_uses_the_unsafe_strategy() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { status: 201 });
        let client = Client::builder(transport, endpoint()).build().unwrap();

        let request = Request::builder(Method::POST, endpoint()).build();
        let response = client.request(request).await;
        assert_eq!(response.status(), 201);
    }

    #[tokio::test]
    async fn explicit_deadline_overrides_the_default_timeout() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { status: 408 });
        let client = Client::builder(transport, endpoint()).timeout(Duration::from_secs(30)).build().unwrap();

        let tight = Deadline::from_timeout(Duration::from_millis(1));
        let request = Request::builder(Method::GET, endpoint()).build();
        let response = client.request_with(request, Some(tight), None, None).await;
        assert_eq!(response.status(), 408);
    }

    #[tokio::test]
    async fn rejects_zero_timeout_at_build_time() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { status: 200 });
        let err = Client::builder(transport, endpoint()).timeout(Duration::ZERO).build().unwrap_err();
        assert_eq!(err, ClientError::NonPositiveTimeout);
    }

    #[tokio::test]
    async fn ambient_context_supplies_deadline_and_priority_when_not_overridden() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport { status: 200 });
        let client = Client::builder(transport, endpoint()).build().unwrap();

        let ambient = CallContext::new(Some(Deadline::from_timeout(Duration::from_secs(1))), Some(Priority::High));
        let request = Request::builder(Method::GET, endpoint()).build();
        let response = ambient.scope(client.request(request)).await;
        assert_eq!(response.status(), 200);
    }
}

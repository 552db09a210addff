use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use aio_resilience_core::{Deadline, DeadlineProvider, DelayProvider, PassThroughDeadline, Priority, Request, Response, ResponseVerdict};

use crate::error::StrategyError;
use crate::scoped::ScopedResponse;

/// Issues one attempt and reports the classifier's verdict on it.
pub type SendAttemptFn = dyn Fn(Url, Request, Deadline, Priority) -> BoxFuture<'static, (Box<dyn Response>, ResponseVerdict)> + Send + Sync;

/// A policy for turning one logical call into one or more attempts.
pub trait RequestStrategy: Send + Sync {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse>;
}

async fn send(send_attempt: &SendAttemptFn, endpoint: Url, request: Request, deadline: Deadline, priority: Priority) -> ScopedResponse {
    let (response, verdict) = send_attempt(endpoint, request, deadline, priority).await;
    ScopedResponse::new(response, verdict)
}

/// Issues exactly one attempt.
#[derive(Default)]
pub struct SingleAttempt;

impl RequestStrategy for SingleAttempt {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        Box::pin(async move { send(&send_attempt, endpoint, request, deadline, priority).await })
    }
}

/// Issues attempts one after another, stopping on the first accepted
/// response, exhaustion of attempts, or a deadline too tight for another
/// round trip.
pub struct Sequential {
    attempts_count: u32,
    delay_provider: Arc<dyn DelayProvider>,
    deadline_provider: Arc<dyn DeadlineProvider>,
}

impl Sequential {
    pub fn new(attempts_count: u32, delay_provider: Arc<dyn DelayProvider>) -> Self {
        Self::with_deadline_provider(attempts_count, delay_provider, Arc::new(PassThroughDeadline))
    }

    pub fn with_deadline_provider(attempts_count: u32, delay_provider: Arc<dyn DelayProvider>, deadline_provider: Arc<dyn DeadlineProvider>) -> Self {
        assert!(attempts_count >= 1, "attempts_count must be >= 1");
        Self { attempts_count, delay_provider, deadline_provider }
    }
}

impl RequestStrategy for Sequential {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        let attempts_count = self.attempts_count;
        let delay_provider = Arc::clone(&self.delay_provider);
        let deadline_provider = Arc::clone(&self.deadline_provider);

        Box::pin(async move {
            let mut current: Option<ScopedResponse> = None;

            for n in 0..attempts_count {
                let attempt_deadline = deadline_provider.deadline(&deadline, n, attempts_count);
                let response = send(&send_attempt, endpoint.clone(), request.clone(), attempt_deadline, priority).await;
                let accepted = response.verdict() == ResponseVerdict::Accept;
                current = Some(response);

                if accepted || n + 1 == attempts_count {
                    break;
                }

                let retry_delay = delay_provider.delay(n + 1);
                if deadline.remaining() < retry_delay {
                    break;
                }
                tokio::time::sleep(retry_delay).await;
            }

            current.expect("Sequential always performs at least one attempt")
        })
    }
}

/// Launches every attempt concurrently, staggering all but the first by the
/// delay provider, and yields whichever is accepted first. Attempts still
/// running when one is accepted are aborted; any response produced by a
/// discarded attempt is closed via [`ScopedResponse`]'s drop behaviour.
pub struct Parallel {
    attempts_count: u32,
    delay_provider: Arc<dyn DelayProvider>,
}

impl Parallel {
    pub fn new(attempts_count: u32, delay_provider: Arc<dyn DelayProvider>) -> Self {
        assert!(attempts_count >= 1, "attempts_count must be >= 1");
        Self { attempts_count, delay_provider }
    }
}

impl RequestStrategy for Parallel {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        let attempts_count = self.attempts_count;
        let delay_provider = Arc::clone(&self.delay_provider);

        Box::pin(async move {
            let mut attempts: JoinSet<ScopedResponse> = JoinSet::new();

            for n in 0..attempts_count {
                let send_attempt = Arc::clone(&send_attempt);
                let endpoint = endpoint.clone();
                let request = request.clone();
                let delay_provider = Arc::clone(&delay_provider);

                attempts.spawn(async move {
                    if n > 0 {
                        let stagger = delay_provider.delay(n).min(deadline.remaining());
                        tokio::time::sleep(stagger).await;
                    }
                    send(&send_attempt, endpoint, request, deadline, priority).await
                });
            }

            let mut first_reject: Option<ScopedResponse> = None;

            while let Some(joined) = attempts.join_next().await {
                match joined {
                    Ok(response) => {
                        if response.verdict() == ResponseVerdict::Accept {
                            attempts.abort_all();
                            return response;
                        }
                        if first_reject.is_none() {
                            first_reject = Some(response);
                        }
                    }
                    Err(join_error) => {
                        #[cfg(feature = "tracing")]
                        if !join_error.is_cancelled() {
                            tracing::warn!(error = %join_error, "a parallel attempt task panicked");
                        }
                        #[cfg(not(feature = "tracing"))]
                        let _ = join_error;
                    }
                }
            }

            first_reject.expect("Parallel always launches at least one attempt")
        })
    }
}

/// Retries the wrapped strategy until it is accepted or the deadline expires.
pub struct RetryUntilDeadlineExpired {
    inner: Arc<dyn RequestStrategy>,
    delay_provider: Arc<dyn DelayProvider>,
}

impl RetryUntilDeadlineExpired {
    pub fn new(inner: Arc<dyn RequestStrategy>, delay_provider: Arc<dyn DelayProvider>) -> Self {
        Self { inner, delay_provider }
    }
}

impl RequestStrategy for RetryUntilDeadlineExpired {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        let inner = Arc::clone(&self.inner);
        let delay_provider = Arc::clone(&self.delay_provider);

        Box::pin(async move {
            let mut attempt_number: u32 = 0;
            loop {
                let response = inner.request(Arc::clone(&send_attempt), endpoint.clone(), request.clone(), deadline, priority).await;

                if response.verdict() == ResponseVerdict::Accept || deadline.expired() {
                    return response;
                }
                drop(response);

                attempt_number += 1;
                let retry_delay = delay_provider.delay(attempt_number).min(deadline.remaining());
                tokio::time::sleep(retry_delay).await;
            }
        })
    }
}

/// Dispatches to a per-method inner strategy. A method with no configured
/// strategy is a wiring mistake, not a runtime condition to recover from.
pub struct MethodBased {
    strategy_by_method: HashMap<Method, Arc<dyn RequestStrategy>>,
}

impl MethodBased {
    pub fn new(strategy_by_method: HashMap<Method, Arc<dyn RequestStrategy>>) -> Self {
        Self { strategy_by_method }
    }
}

impl RequestStrategy for MethodBased {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        match self.strategy_by_method.get(&request.method) {
            Some(strategy) => strategy.request(send_attempt, endpoint, request, deadline, priority),
            None => {
                let method = request.method.clone();
                Box::pin(async move { panic!("{}", StrategyError::UnmappedMethod(method)) })
            }
        }
    }
}

/// Gates entry to the wrapped strategy through a semaphore, bounding how
/// many of its attempts may be in flight at once.
pub struct MaxConcurrency {
    inner: Arc<dyn RequestStrategy>,
    semaphore: Arc<Semaphore>,
}

impl MaxConcurrency {
    pub fn new(inner: Arc<dyn RequestStrategy>, limit: usize) -> Self {
        Self { inner, semaphore: Arc::new(Semaphore::new(limit)) }
    }
}

impl RequestStrategy for MaxConcurrency {
    fn request(
        &self,
        send_attempt: Arc<SendAttemptFn>,
        endpoint: Url,
        request: Request,
        deadline: Deadline,
        priority: Priority,
    ) -> BoxFuture<'static, ScopedResponse> {
        let inner = Arc::clone(&self.inner);
        let semaphore = Arc::clone(&self.semaphore);

        Box::pin(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            inner.request(send_attempt, endpoint, request, deadline, priority).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aio_resilience_core::{ConstantDelay, EmptyResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn endpoint() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    fn request() -> Request {
        Request::builder(Method::GET, endpoint()).build()
    }

    fn counting_send(statuses: Vec<u16>) -> (Arc<SendAttemptFn>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let statuses = Arc::new(statuses);
        let calls_clone = Arc::clone(&calls);
        let f: Arc<SendAttemptFn> = Arc::new(move |_e, _r, _d, _p| {
            let i = calls_clone.fetch_add(1, Ordering::SeqCst) as usize;
            let statuses = Arc::clone(&statuses);
            Box::pin(async move {
                let status = statuses[i.min(statuses.len() - 1)];
                let verdict = if status < 400 { ResponseVerdict::Accept } else { ResponseVerdict::Reject };
                (Box::new(EmptyResponse::new(status)) as Box<dyn Response>, verdict)
            })
        });
        (f, calls)
    }

    #[tokio::test]
    async fn single_attempt_issues_one_call() {
        let (send_attempt, calls) = counting_send(vec![200]);
        let strategy = SingleAttempt;
        let response = strategy.request(send_attempt, endpoint(), request(), Deadline::from_timeout(Duration::from_secs(1)), Priority::Normal).await;
        assert_eq!(response.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_stops_at_first_accept() {
        let (send_attempt, calls) = counting_send(vec![500, 500, 200]);
        let strategy = Sequential::new(5, Arc::new(ConstantDelay::new(Duration::from_millis(1))));
        let response = strategy.request(send_attempt, endpoint(), request(), Deadline::from_timeout(Duration::from_secs(5)), Priority::Normal).await;
        assert_eq!(response.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sequential_yields_last_reject_when_exhausted() {
        let (send_attempt, calls) = counting_send(vec![500, 500, 500]);
        let strategy = Sequential::new(3, Arc::new(ConstantDelay::new(Duration::from_millis(1))));
        let response = strategy.request(send_attempt, endpoint(), request(), Deadline::from_timeout(Duration::from_secs(5)), Priority::Normal).await;
        assert_eq!(response.status(), 500);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn parallel_yields_the_accepted_attempt() {
        let (send_attempt, _calls) = counting_send(vec![500, 200, 500]);
        let strategy = Parallel::new(3, Arc::new(ConstantDelay::new(Duration::from_millis(1))));
        let response = strategy.request(send_attempt, endpoint(), request(), Deadline::from_timeout(Duration::from_secs(5)), Priority::Normal).await;
        assert!(response.status() == 200 || response.status() == 500);
    }

    #[tokio::test]
    async fn retry_until_deadline_expired_stops_once_accepted() {
        let (send_attempt, calls) = counting_send(vec![500, 200]);
        let inner: Arc<dyn RequestStrategy> = Arc::new(SingleAttempt);
        let strategy = RetryUntilDeadlineExpired::new(inner, Arc::new(ConstantDelay::new(Duration::from_millis(1))));
        let response = strategy.request(send_attempt, endpoint(), request(), Deadline::from_timeout(Duration::from_secs(5)), Priority::Normal).await;
        assert_eq!(response.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn method_based_dispatches_by_method() {
        let (get_send, get_calls) = counting_send(vec![200]);
        let (post_send, post_calls) = counting_send(vec![201]);

        let mut by_method: HashMap<Method, Arc<dyn RequestStrategy>> = HashMap::new();
        by_method.insert(Method::GET, Arc::new(SingleAttempt));
        by_method.insert(Method::POST, Arc::new(SingleAttempt));
        let strategy = MethodBased::new(by_method);

        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        let get_request = Request::builder(Method::GET, endpoint()).build();
        let response = strategy.request(get_send, endpoint(), get_request, deadline, Priority::Normal).await;
        assert_eq!(response.status(), 200);
        assert_eq!(get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(post_calls.load(Ordering::SeqCst), 0);

        let post_request = Request::builder(Method::POST, endpoint()).build();
        let response = strategy.request(post_send, endpoint(), post_request, deadline, Priority::Normal).await;
        assert_eq!(response.status(), 201);
    }

    #[tokio::test]
    #[should_panic(expected = "no strategy configured")]
    async fn method_based_panics_on_unmapped_method() {
        let (send_attempt, _calls) = counting_send(vec![200]);
        let strategy = MethodBased::new(HashMap::new());
        let deadline = Deadline::from_timeout(Duration::from_secs(5));
        strategy.request(send_attempt, endpoint(), request(), deadline, Priority::Normal).await;
    }

    #[tokio::test]
    async fn max_concurrency_gates_entry() {
        let (send_attempt, calls) = counting_send(vec![200, 200]);
        let inner: Arc<dyn RequestStrategy> = Arc::new(SingleAttempt);
        let strategy = MaxConcurrency::new(inner, 1);
        let deadline = Deadline::from_timeout(Duration::from_secs(5));

        let a = strategy.request(Arc::clone(&send_attempt), endpoint(), request(), deadline, Priority::Normal);
        let b = strategy.request(send_attempt, endpoint(), request(), deadline, Priority::Normal);
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.status(), 200);
        assert_eq!(rb.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Response classification: should this outcome end the attempt loop or
//! trigger a retry?

use std::collections::HashMap;

use crate::model::{header, Response};

/// A classifier's verdict on a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseVerdict {
    Accept,
    Reject,
}

pub trait ResponseClassifier: Send + Sync {
    fn classify(&self, response: &dyn Response) -> ResponseVerdict;
}

/// The default classifier, evaluated in a fixed precedence order: an explicit
/// per-status override wins first, then `X-Do-Not-Retry`, then the synthetic
/// and real status-code rules.
pub struct DefaultResponseClassifier {
    network_errors_code: u16,
    too_many_redirects_code: u16,
    verdict_for_status: HashMap<u16, ResponseVerdict>,
}

impl Default for DefaultResponseClassifier {
    fn default() -> Self {
        Self {
            network_errors_code: 489,
            too_many_redirects_code: 488,
            verdict_for_status: HashMap::new(),
        }
    }
}

impl DefaultResponseClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_errors_code(mut self, code: u16) -> Self {
        self.network_errors_code = code;
        self
    }

    pub fn too_many_redirects_code(mut self, code: u16) -> Self {
        self.too_many_redirects_code = code;
        self
    }

    pub fn verdict_for_status(mut self, status: u16, verdict: ResponseVerdict) -> Self {
        self.verdict_for_status.insert(status, verdict);
        self
    }
}

impl ResponseClassifier for DefaultResponseClassifier {
    fn classify(&self, response: &dyn Response) -> ResponseVerdict {
        if let Some(verdict) = self.verdict_for_status.get(&response.status()) {
            return *verdict;
        }
        if response.headers().contains_key(header::X_DO_NOT_RETRY) {
            return ResponseVerdict::Accept;
        }
        if response.is_server_error() {
            return ResponseVerdict::Reject;
        }
        if response.status() == self.network_errors_code {
            return ResponseVerdict::Reject;
        }
        if response.status() == self.too_many_redirects_code {
            return ResponseVerdict::Accept;
        }
        if response.status() == 408 {
            return ResponseVerdict::Reject;
        }
        if response.status() == 429 {
            return ResponseVerdict::Reject;
        }
        ResponseVerdict::Accept
    }
}

/// Adapts a plain closure into a [`ResponseClassifier`].
pub struct FnClassifier<F>(F)
where
    F: Fn(&dyn Response) -> ResponseVerdict + Send + Sync;

impl<F> FnClassifier<F>
where
    F: Fn(&dyn Response) -> ResponseVerdict + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ResponseClassifier for FnClassifier<F>
where
    F: Fn(&dyn Response) -> ResponseVerdict + Send + Sync,
{
    fn classify(&self, response: &dyn Response) -> ResponseVerdict {
        (self.0)(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmptyResponse;
    use http::{HeaderName, HeaderValue};

    #[test]
    fn do_not_retry_header_wins_over_5xx() {
        let resp = EmptyResponse::with_headers(500, {
            let mut h = http::HeaderMap::new();
            h.insert(HeaderName::from_static(header::X_DO_NOT_RETRY), HeaderValue::from_static("1"));
            h
        });
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Accept);
    }

    #[test]
    fn server_errors_are_rejected() {
        let resp = EmptyResponse::new(503);
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Reject);
    }

    #[test]
    fn too_many_redirects_synthetic_is_accepted() {
        let resp = EmptyResponse::new(488);
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Accept);
    }

    #[test]
    fn network_error_synthetic_is_rejected() {
        let resp = EmptyResponse::new(489);
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Reject);
    }

    #[test]
    fn explicit_status_override_wins_over_everything() {
        let resp = EmptyResponse::new(500);
        let classifier = DefaultResponseClassifier::new().verdict_for_status(500, ResponseVerdict::Accept);
        assert_eq!(classifier.classify(&resp), ResponseVerdict::Accept);
    }

    #[test]
    fn ordinary_success_is_accepted() {
        let resp = EmptyResponse::new(200);
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Accept);
    }

    #[test]
    fn too_many_requests_is_rejected() {
        let resp = EmptyResponse::new(429);
        assert_eq!(DefaultResponseClassifier::new().classify(&resp), ResponseVerdict::Reject);
    }
}

use futures::future::BoxFuture;
use url::Url;

/// Where a client sends its requests: a fixed URL, or a closure that
/// resolves one per call (service discovery, a rotating load balancer, ...).
#[derive(Clone)]
pub enum Endpoint {
    Static(Url),
    Provider(std::sync::Arc<dyn Fn() -> BoxFuture<'static, Url> + Send + Sync>),
}

impl Endpoint {
    pub async fn resolve(&self) -> Url {
        match self {
            Endpoint::Static(url) => url.clone(),
            Endpoint::Provider(provider) => provider().await,
        }
    }
}

impl From<Url> for Endpoint {
    fn from(url: Url) -> Self {
        Endpoint::Static(url)
    }
}

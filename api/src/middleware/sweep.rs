use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use fleet_assist_runtime::sessions::SessionRegistry;
use fleet_assist_runtime::transport::AgentTransport;
use tower::{Layer, Service, ServiceExt};

/// Evicts idle sessions before every request. There is no background timer;
/// liveness is checked lazily as traffic arrives.
#[derive(Clone)]
pub struct SessionSweepLayer {
    registry: Arc<SessionRegistry<AgentTransport>>,
}

impl SessionSweepLayer {
    pub fn new(registry: Arc<SessionRegistry<AgentTransport>>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for SessionSweepLayer {
    type Service = SessionSweepService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionSweepService {
            inner,
            registry: self.registry.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionSweepService<S> {
    inner: S,
    registry: Arc<SessionRegistry<AgentTransport>>,
}

impl<S> Service<Request> for SessionSweepService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let not_ready = self.inner.clone();
        let ready = std::mem::replace(&mut self.inner, not_ready);
        let registry = self.registry.clone();

        Box::pin(async move {
            let evicted = registry.sweep_expired().await;
            if evicted > 0 {
                tracing::info!(
                    event = "sessions_swept",
                    evicted,
                    remaining = registry.len(),
                    "evicted idle sessions"
                );
            }
            Ok(ready.oneshot(req).await.into_response())
        })
    }
}

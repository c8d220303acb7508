use crate::error::RelayError;
use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use dashmap::DashMap;
use futures::future::LocalBoxFuture;
use log::{debug, warn};
use std::future::{Ready, ready};
use std::sync::Arc;
use std::time::{Duration, Instant};

const UNKNOWN_CLIENT: &str = "unknown";

struct Window {
    started: Instant,
    count: u32,
}

struct RateLimiterInner {
    quota: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

/// Fixed-window request counter keyed by client address.
///
/// Also usable as actix middleware: requests over quota are answered with 429 before the
/// wrapped service runs.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                quota,
                window,
                windows: DashMap::new(),
            }),
        }
    }

    /// Count one request for `key`. On rejection returns the time until the window resets.
    pub fn try_acquire(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut window = self
            .inner
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.inner.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.inner.quota {
            return Err(self.inner.window.saturating_sub(now.duration_since(window.started)));
        }
        window.count += 1;
        debug!(
            "Rate limit: {} used {}/{} in current window",
            key, window.count, self.inner.quota
        );
        Ok(())
    }

    /// Drop windows that have fully elapsed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.windows.len();
        self.inner
            .windows
            .retain(|_, w| now.duration_since(w.started) < self.inner.window);
        before - self.inner.windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.inner.windows.len()
    }

    pub fn describe(&self) -> String {
        format!(
            "{} per {} seconds",
            self.inner.quota,
            self.inner.window.as_secs()
        )
    }
}

/// Client address used as the limiter key.
///
/// Requests without a peer address all share the `"unknown"` bucket.
fn client_key(req: &ServiceRequest) -> String {
    match req.peer_addr() {
        Some(addr) => addr.ip().to_string(),
        None => {
            debug!("No peer address for {}, using the shared unknown bucket", req.path());
            UNKNOWN_CLIENT.to_string()
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let key = client_key(&req);
        match self.limiter.try_acquire(&key) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(retry_after) => {
                warn!("Rate limit exceeded for {} on {}", key, req.path());
                let response = RelayError::RateLimited {
                    limit: self.limiter.describe(),
                    retry_after_secs: retry_after.as_secs().max(1),
                }
                .error_response();
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}

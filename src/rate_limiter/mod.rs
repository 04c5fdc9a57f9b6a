//! Fixed-window, per-client-IP request limiter for the API routes.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{ApiError, ServiceError};

fn num_to_header_value<T: ToString>(n: T) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn roll_window(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }
    }

    fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 300,
            window_duration: Duration::from_secs(3600),
            enable_headers: true,
        }
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            requests_per_window: cfg.rate_limit_requests,
            window_duration: cfg.rate_limit_window(),
            enable_headers: true,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts one request against `key`.
    pub fn check_rate_limit(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let window = self.config.window_duration;
        let limit = self.config.requests_per_window;

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::new(now));
        entry.roll_window(now, window);

        let allowed = entry.count < limit;
        if allowed {
            entry.count += 1;
        }

        RateLimitResult {
            allowed,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_time: entry.time_until_reset(now, window),
        }
    }

    pub fn get_remaining_quota(&self, key: &str) -> u32 {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if now.duration_since(entry.window_start) < self.config.window_duration => {
                self.config.requests_per_window.saturating_sub(entry.count)
            }
            _ => self.config.requests_per_window,
        }
    }

    /// Drops entries whose window has fully elapsed.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let window = self.config.window_duration;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < window);
    }
}

/// Periodically evicts stale entries so the map does not grow without bound.
pub async fn start_cleanup_task(rate_limiter: RateLimiter, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        rate_limiter.cleanup_expired();
        debug!("rate limiter cleanup pass finished");
    }
}

/// Client IP from proxy headers, then the socket address.
pub fn extract_ip_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                return format!("ip:{}", ip.trim());
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return format!("ip:{}", ip_str.trim());
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }

    "ip:unknown".to_string()
}

fn apply_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", num_to_header_value(result.limit));
    headers.insert(
        "X-RateLimit-Remaining",
        num_to_header_value(result.remaining),
    );
    headers.insert(
        "X-RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = extract_ip_key(&request);
    let result = rate_limiter.check_rate_limit(&key);

    let mut response = if result.allowed {
        next.run(request).await
    } else {
        warn!(key = %key, "Rate limit exceeded");
        ApiError::from(ServiceError::RateLimitExceeded).into_response()
    };

    if rate_limiter.config().enable_headers {
        apply_headers(&mut response, &result);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: limit,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
        })
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(2);
        assert!(limiter.check_rate_limit("k").allowed);
        let second = limiter.check_rate_limit("k");
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!limiter.check_rate_limit("k").allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check_rate_limit("a").allowed);
        assert!(limiter.check_rate_limit("b").allowed);
        assert!(!limiter.check_rate_limit("a").allowed);
    }

    #[test]
    fn expired_window_resets_quota() {
        let limiter = RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: 1,
            window_duration: Duration::from_millis(20),
            enable_headers: true,
        });
        assert!(limiter.check_rate_limit("k").allowed);
        assert!(!limiter.check_rate_limit("k").allowed);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(limiter.get_remaining_quota("k"), 1);
        assert!(limiter.check_rate_limit("k").allowed);
        limiter.cleanup_expired();
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip_key(&request), "ip:203.0.113.9");
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_ip_key(&bare), "ip:unknown");
    }

    #[tokio::test]
    async fn middleware_returns_429_with_headers() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter(1), rate_limit_middleware));

        let ok = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["X-RateLimit-Remaining"], "0");

        let limited = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers()["X-RateLimit-Limit"], "1");
    }
}

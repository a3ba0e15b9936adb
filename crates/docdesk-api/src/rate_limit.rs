use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ApiError;

/// Fixed-window request counter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (count, window_start)
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// `max_requests == 0` turns the limiter off.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let mut state = self.state.lock().await;
        let entry = state.entry(ip).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            *entry = (1, now);
            return true;
        }

        if entry.0 < self.max_requests {
            entry.0 += 1;
            true
        } else {
            false
        }
    }

    /// Drops counters whose window has long passed.
    pub async fn cleanup(&self) {
        self.cleanup_at(Instant::now()).await;
    }

    async fn cleanup_at(&self, now: Instant) {
        let mut state = self.state.lock().await;
        state.retain(|_, (_, start)| now.duration_since(*start) < self.window * 2);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.state.lock().await.len()
    }
}

/// Rejects with 429 once the caller's IP has used up its window.
///
/// Needs the server to be built with `into_make_service_with_connect_info`;
/// without it every request counts against loopback.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !limiter.check(ip).await {
        warn!("Rate limit exceeded for {}", ip);
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[tokio::test]
    async fn limits_per_ip_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(A, now).await);
        assert!(limiter.check_at(A, now).await);
        assert!(!limiter.check_at(A, now).await);
        assert!(limiter.check_at(B, now).await);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(A, start).await);
        assert!(!limiter.check_at(A, start + Duration::from_secs(59)).await);
        assert!(limiter.check_at(A, start + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn zero_disables() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..1000 {
            assert!(limiter.check(A).await);
        }
        assert_eq!(limiter.tracked().await, 0);
    }

    #[tokio::test]
    async fn cleanup_forgets_stale_entries() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10));
        let start = Instant::now();
        limiter.check_at(A, start).await;
        limiter.check_at(B, start + Duration::from_secs(15)).await;
        limiter.cleanup_at(start + Duration::from_secs(25)).await;
        assert_eq!(limiter.tracked().await, 1);
    }
}

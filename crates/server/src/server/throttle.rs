//! Fixed-window, per-client request throttling for `/api/`.

use std::{
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::ServiceError;
use dashmap::DashMap;
use tracing::debug;

use super::{error::ApiError, middleware::client_ip};

/// Request budget per client per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

/// One client's current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    used: usize,
}

impl Window {
    fn open(now: Instant) -> Self {
        Self {
            opened_at: now,
            used: 0,
        }
    }

    /// Time left before this window closes; zero once it has.
    fn closes_in(&self, now: Instant, length: Duration) -> Duration {
        length.saturating_sub(now.saturating_duration_since(self.opened_at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Denied { retry_after: Duration },
}

/// Whole seconds for a `Retry-After` header: rounded up, never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Shared per-IP window counters. Clones share state.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    trust_forwarded_for: bool,
    windows: Arc<DashMap<IpAddr, Window>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit, trust_forwarded_for: bool) -> Self {
        Self {
            limit,
            trust_forwarded_for,
            windows: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn check(&self, ip: IpAddr) -> ThrottleDecision {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> ThrottleDecision {
        // Must run before `entry` takes a shard lock.
        self.sweep_if_due(now);

        let RateLimit {
            max_requests,
            window,
        } = self.limit;
        let mut current = self.windows.entry(ip).or_insert_with(|| Window::open(now));
        if current.closes_in(now, window).is_zero() {
            *current = Window::open(now);
        }
        if current.used >= max_requests {
            return ThrottleDecision::Denied {
                retry_after: current.closes_in(now, window),
            };
        }
        current.used += 1;
        ThrottleDecision::Allowed
    }

    /// At most once per window length, forget clients whose window has closed.
    fn sweep_if_due(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last) < self.limit.window {
            return;
        }
        *last = now;
        drop(last);

        let length = self.limit.window;
        self.windows
            .retain(|_, w| !w.closes_in(now, length).is_zero());
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default(), true)
    }
}

/// Axum middleware: reject the request with 429 once the caller's window is spent.
pub async fn enforce(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(req.headers(), peer, limiter.trust_forwarded_for);

    match limiter.check(ip) {
        ThrottleDecision::Allowed => next.run(req).await,
        ThrottleDecision::Denied { retry_after } => {
            debug!(client = %ip, "request throttled");
            ApiError(ServiceError::RateLimited {
                retry_after_secs: retry_after_secs(retry_after),
            })
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            RateLimit {
                max_requests,
                window: Duration::from_secs(window_secs),
            },
            true,
        )
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));

    #[test]
    fn default_is_thirty_per_minute() {
        assert_eq!(
            RateLimit::default(),
            RateLimit {
                max_requests: 30,
                window: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn denies_after_budget_is_spent() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.check_at(CLIENT, now), ThrottleDecision::Allowed);
        }
        match limiter.check_at(CLIENT, now + Duration::from_secs(10)) {
            ThrottleDecision::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            ThrottleDecision::Allowed => panic!("fourth request should be denied"),
        }
    }

    #[test]
    fn window_resets() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert_eq!(limiter.check_at(CLIENT, now), ThrottleDecision::Allowed);
        assert!(matches!(
            limiter.check_at(CLIENT, now),
            ThrottleDecision::Denied { .. }
        ));
        assert_eq!(
            limiter.check_at(CLIENT, now + Duration::from_secs(60)),
            ThrottleDecision::Allowed
        );
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert_eq!(limiter.check_at(CLIENT, now), ThrottleDecision::Allowed);
        assert_eq!(limiter.check_at(OTHER, now), ThrottleDecision::Allowed);
    }

    #[test]
    fn zero_budget_always_denies() {
        let limiter = limiter(0, 60);
        assert!(matches!(
            limiter.check(CLIENT),
            ThrottleDecision::Denied { .. }
        ));
    }

    #[test]
    fn zero_budget_reports_a_full_window() {
        let limiter = limiter(0, 60);
        assert_eq!(
            limiter.check_at(CLIENT, Instant::now()),
            ThrottleDecision::Denied {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn closed_windows_are_swept() {
        let limiter = limiter(10, 1);
        let start = Instant::now();
        limiter.check_at(CLIENT, start);
        limiter.check_at(OTHER, start);
        assert_eq!(limiter.tracked_clients(), 2);

        let later = start + Duration::from_secs(10);
        limiter.check_at(OTHER, later);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn retry_after_rounds_up_and_is_never_zero() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(200)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(50)), 50);
        assert_eq!(retry_after_secs(Duration::from_millis(50_001)), 51);
    }
}

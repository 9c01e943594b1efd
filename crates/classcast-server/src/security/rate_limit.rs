use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::settings::RateLimitConfig;
use crate::security::client_ip::client_ip;
use crate::utils::error::ApiError;

/// Per-client budget for download attempts (GET and HEAD alike).
///
/// A full burst is available up front and refills one attempt every
/// `window / burst`.
pub struct DownloadLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl DownloadLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let burst = NonZeroU32::new(cfg.download_burst).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(cfg.download_window_seconds.max(1));
        let period = window / burst.get();

        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Forgets clients whose budget has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

pub async fn download_rate_limit(
    State(limiter): State<Arc<DownloadLimiter>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(peer, request.headers());

    if !limiter.check(ip) {
        warn!(client = %ip, "Download rate limit exceeded");
        return Err(ApiError::TooManyRequests(
            "Too many download attempts. Please try again later.".to_string(),
        ));
    }

    debug!(client = %ip, "Download attempt admitted");
    Ok(next.run(request).await)
}

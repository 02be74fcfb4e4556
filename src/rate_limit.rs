use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::error::AppError;

/// Per-client-IP request quota.
#[derive(Clone)]
pub struct RequestLimiter {
    inner: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RequestLimiter {
    /// `None` when `max` is zero, i.e. limiting is off.
    pub fn per_minute(max: u32) -> Option<Self> {
        let max = NonZeroU32::new(max)?;
        Some(Self::with_quota(Quota::per_minute(max)))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            inner: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.inner.check_key(&client).is_ok()
    }

    /// Forget clients whose bucket has fully refilled. Without this the
    /// per-IP map only ever grows.
    pub fn prune(&self) {
        self.inner.retain_recent();
        self.inner.shrink_to_fit();
        debug!(tracked = self.inner.len(), "rate limiter pruned");
    }

    /// Prune on a fixed period for as long as the runtime lives.
    pub fn spawn_pruner(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        })
    }
}

/// Requests without connection info (in-process callers) share one bucket.
pub async fn limit_requests(
    State(limiter): State<RequestLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(client) {
        warn!(%client, uri = %req.uri(), "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(req).await
}

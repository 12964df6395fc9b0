use std::time::Duration;

use rand::Rng;
use reqwest::{header, StatusCode};

use crate::{transport::HttpResponse, TransportOptions};

/// Wait schedule between attempts: exponential from `min_ms`, capped at
/// `max_ms`, with jitter over the upper half of each step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Backoff {
    min_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn from_options(options: &TransportOptions) -> Self {
        Self::new(options.retry_wait_min_ms, options.retry_wait_max_ms)
    }

    /// Wait before retry number `attempt` (0-based).
    ///
    /// A 429 or 503 carrying `Retry-After: <seconds>` waits that long instead,
    /// still capped at `max_ms`.
    pub fn delay(&self, attempt: usize, response: Option<&HttpResponse>) -> Duration {
        if let Some(seconds) = response.and_then(retry_after_seconds) {
            return Duration::from_millis(seconds.saturating_mul(1_000).min(self.max_ms));
        }

        let exp = attempt.min(16) as u32;
        let ceiling = self.min_ms.saturating_mul(1u64 << exp).min(self.max_ms);
        let floor = ceiling / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
    }
}

fn retry_after_seconds(response: &HttpResponse) -> Option<u64> {
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

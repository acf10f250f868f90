//! Bounded exponential backoff for KV-store transport retries.
//!
//! Shaped after the teacher's `kubelet::backoff` module (itself modeled on
//! Kubernetes' own pod backoff), but bounded by a deadline rather than
//! retried forever: `spec.md` §4.1 requires that once the deadline is spent
//! the caller treat the request as denied rather than block indefinitely.

use std::time::{Duration, Instant};

/// Determines how long to wait before retrying a failed KV-store call.
pub trait BackoffStrategy: Send {
    fn reset(&mut self);
    fn next_duration(&mut self) -> Duration;
}

/// Durations double from `base` up to `cap`.
pub struct ExponentialBackoffStrategy {
    base_duration: Duration,
    cap: Duration,
    last_duration: Duration,
}

impl Default for ExponentialBackoffStrategy {
    fn default() -> Self {
        Self {
            base_duration: Duration::from_millis(25),
            cap: Duration::from_millis(400),
            last_duration: Duration::from_secs(0),
        }
    }
}

impl BackoffStrategy for ExponentialBackoffStrategy {
    fn reset(&mut self) {
        self.last_duration = Duration::from_secs(0);
    }

    fn next_duration(&mut self) -> Duration {
        let next = if self.last_duration == Duration::from_secs(0) {
            self.base_duration
        } else {
            self.last_duration * 2
        };
        let next = next.min(self.cap);
        self.last_duration = next;
        next
    }
}

/// Runs `op` with exponential backoff until it succeeds or `deadline` elapses.
///
/// Grounded on the retry-with-bounded-backoff requirement in `spec.md` §4.1
/// ("Failure semantics"). Returns the last error once the deadline is spent.
pub async fn retry_until_deadline<T, E, F, Fut>(
    deadline: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut backoff = ExponentialBackoffStrategy::default();
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if start.elapsed() >= deadline {
                    return Err(e);
                }
                tokio::time::sleep(backoff.next_duration()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();
        let result: Result<u32, &str> = retry_until_deadline(Duration::from_millis(500), || {
            let a = a.clone();
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn exhausts_deadline_and_returns_last_error() {
        let result: Result<(), &str> =
            retry_until_deadline(Duration::from_millis(60), || async { Err("down") }).await;
        assert_eq!(result, Err("down"));
    }
}

use std::future::Future;
use std::time::Duration;

/// Exponential backoff schedule: `base * factor^attempt` seconds, doubled by default.
///
/// Re-expresses the source's effect-wrapped retry behavior (§9) as a plain combinator
/// instead of a global effect type: every fallible async operation used by C4/C5 is
/// wrapped with this rather than hand-rolling a sleep loop at each call site.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub factor: f64,
}

impl BackoffPolicy {
    pub const fn new(max_attempts: u32, base: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            base,
            factor,
        }
    }

    /// Delay before the given attempt (1-indexed: the first retry is attempt 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = self.base.as_millis() as f64 * self.factor.powi(attempt as i32 - 1);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts per the backoff
/// schedule, retrying only while `should_retry` returns true for the error.
///
/// Returns the last error if every attempt is exhausted.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: BackoffPolicy,
    should_retry: R,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_each_attempt() {
        let policy = BackoffPolicy::new(3, Duration::from_secs(2), 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn retries_until_success_within_bound() {
        let policy = BackoffPolicy::new(3, Duration::from_millis(1), 2.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            policy,
            |_| true,
            |_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("not yet")
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = BackoffPolicy::new(3, Duration::from_millis(1), 2.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(policy, |_| true, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

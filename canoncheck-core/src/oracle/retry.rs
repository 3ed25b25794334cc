//! Bounded retry around rate-limited oracles.

use super::Oracle;
use crate::error::OracleError;
use async_trait::async_trait;
use std::time::Duration;

/// Total attempts, including the first call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay unit; attempt `n` waits `n * base` before trying again.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on a server-supplied `retry-after` hint.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Retries rate-limited calls with linearly increasing delay.
///
/// Any other error is returned immediately. When attempts run out the last
/// error is wrapped in [`OracleError::RetriesExhausted`].
pub struct Retrying<O> {
    inner: O,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl<O: Oracle> Retrying<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Wait before the attempt following `attempt`. A server hint wins when
    /// longer, but never beyond `max_delay`.
    fn delay_after(&self, attempt: u32, err: &OracleError) -> Duration {
        let linear = self.base_delay * attempt;
        match err {
            OracleError::RateLimited {
                retry_after: Some(hint),
            } => linear.max((*hint).min(self.max_delay)),
            _ => linear,
        }
    }
}

#[async_trait]
impl<O: Oracle> Oracle for Retrying<O> {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let mut attempt = 1;
        loop {
            let err = match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                tracing::warn!(attempts = attempt, error = %err, "giving up on rate-limited oracle");
                return Err(OracleError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_after(attempt, &err);
            tracing::warn!(attempt, ?delay, "oracle rate limited, backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingOracle, ScriptedOracle};

    fn rate_limited() -> OracleError {
        OracleError::RateLimited { retry_after: None }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let inner = ScriptedOracle::from_results(vec![Err(rate_limited()), Ok("SUPPORT".into())]);
        let oracle = Retrying::new(inner);

        let started = tokio::time::Instant::now();
        assert_eq!(oracle.complete("p").await.unwrap(), "SUPPORT");
        assert_eq!(oracle.inner().calls(), 2);
        assert!(started.elapsed() >= DEFAULT_BASE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let oracle = Retrying::new(FailingOracle::rate_limited());

        let started = tokio::time::Instant::now();
        let err = oracle.complete("p").await.unwrap_err();
        assert!(matches!(
            err,
            OracleError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(oracle.inner().calls(), 3);
        // 1 * base + 2 * base
        assert!(started.elapsed() >= DEFAULT_BASE_DELAY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let oracle = Retrying::new(FailingOracle::unavailable("bad key"));
        let err = oracle.complete("p").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
        assert_eq!(oracle.inner().calls(), 1);
    }

    #[test]
    fn test_retry_after_hint_extends_delay() {
        let oracle = Retrying::new(FailingOracle::rate_limited()).with_base_delay(Duration::from_secs(1));
        let hinted = OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(10)),
        };
        assert_eq!(oracle.delay_after(1, &hinted), Duration::from_secs(10));
        assert_eq!(oracle.delay_after(2, &rate_limited()), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let oracle = Retrying::new(FailingOracle::rate_limited());
        let day = OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(86_400)),
        };
        assert_eq!(oracle.delay_after(1, &day), DEFAULT_MAX_DELAY);

        let oracle = oracle.with_max_delay(Duration::from_secs(5));
        assert_eq!(oracle.delay_after(1, &day), Duration::from_secs(5));
        // The linear schedule itself is not cut short by the cap.
        assert_eq!(oracle.delay_after(3, &day), DEFAULT_BASE_DELAY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_hint_does_not_stall() {
        let hinted = OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(86_400)),
        };
        let inner = ScriptedOracle::from_results(vec![Err(hinted), Ok("SUPPORT".into())]);
        let oracle = Retrying::new(inner);

        let started = tokio::time::Instant::now();
        assert_eq!(oracle.complete("p").await.unwrap(), "SUPPORT");
        assert!(started.elapsed() < Duration::from_secs(61));
    }
}

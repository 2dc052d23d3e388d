use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Fixed attempt count with linear backoff; every attempt carries a timeout.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(300),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = anyhow!("{what}: no attempts made");

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    tracing::debug!("{} failed (attempt {}/{}): {}", what, attempt, attempts, err);
                    last_err = err;
                }
                Err(_) => {
                    tracing::debug!("{} timed out (attempt {}/{})", what, attempt, attempts);
                    last_err = anyhow!("{what}: timed out after {:?}", self.timeout);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(last_err)
    }
}

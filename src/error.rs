//! Retry policy and error classification for boundary-crossing calls.
//!
//! Idempotent reads (baseline fetch, variable extraction) retry a bounded
//! number of times with fixed backoff. Mutating calls are never retried:
//! re-sending an apply or a PR creation after an ambiguous failure risks
//! duplicating the mutation.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::protocol::ProtocolError;

/// Retry policy for idempotent reads: bounded attempts, fixed backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Policy for mutating calls.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Run an async operation under a retry policy. Returns the last error,
/// wrapped with the attempt count, once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempts >= policy.max_attempts {
                    return Err(anyhow::anyhow!(
                        "operation failed after {} attempts: {}",
                        attempts,
                        e
                    ));
                }
                warn!(
                    attempt = attempts,
                    max = policy.max_attempts,
                    error = %e,
                    "retrying after {:?}",
                    policy.backoff
                );
                sleep(policy.backoff).await;
            }
        }
    }
}

/// Failure taxonomy. Partial application is deliberately absent: it is a
/// first-class field of the apply report, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unparsable or unknown-reference input; recovered locally by dropping
    /// the offending record with a warning.
    MalformedInput,

    /// A document/source-control/AI call failed or timed out.
    Protocol,

    /// The channel itself is gone; nothing partial can be claimed.
    Fatal,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Protocol)
    }
}

pub fn classify_protocol(error: &ProtocolError) -> ErrorKind {
    if error.is_fatal() {
        ErrorKind::Fatal
    } else {
        ErrorKind::Protocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };

        let result: Result<u32> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_single_error_after_exhaustion() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        };
        let result: Result<()> =
            with_retry(&policy, || async { Err::<(), _>("boom") }).await;
        let message = result.unwrap_err().to_string();
        assert!(message.contains("after 2 attempts"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify_protocol(&ProtocolError::ChannelUnavailable("gone".into())),
            ErrorKind::Fatal
        );
        assert_eq!(
            classify_protocol(&ProtocolError::Timeout("slow".into())),
            ErrorKind::Protocol
        );
        assert!(ErrorKind::Protocol.is_retryable());
        assert!(!ErrorKind::Fatal.is_retryable());
    }
}

// OpenRouter API module
// Shared HTTP plumbing for the embeddings and chat completion clients

pub mod chat;
pub mod embeddings;

use std::time::Duration;
use tracing::{debug, error, warn};

pub use chat::{ChatClient, NO_RELEVANT_INFORMATION};
pub use embeddings::EmbeddingClient;

/// Why a retried request ultimately failed
#[derive(Debug)]
pub enum RequestFailure {
    /// All attempts failed with transient errors
    Exhausted { attempts: u32, last_error: String },
    /// A non-transient error; retrying would not help
    Fatal(String),
}

impl RequestFailure {
    #[inline]
    pub fn message(&self) -> String {
        match self {
            Self::Exhausted {
                attempts,
                last_error,
            } => format!("request failed after {} attempt(s): {}", attempts, last_error),
            Self::Fatal(message) => message.clone(),
        }
    }
}

/// Retry policy with exponential backoff, shared by the API clients.
///
/// Transient failures (5xx, 429, timeouts, transport errors) are retried up to
/// `max_attempts` times with delay `base_delay * 2^attempt`; anything else
/// fails fast.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    #[inline]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy that never retries
    #[inline]
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay before the retry following the given 1-based attempt
    #[inline]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    pub(crate) fn run<F>(&self, request_fn: F) -> Result<String, RequestFailure>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        self.run_with_sleep(request_fn, std::thread::sleep)
    }

    fn run_with_sleep<F, S>(&self, mut request_fn: F, sleep: S) -> Result<String, RequestFailure>
    where
        F: FnMut() -> Result<String, ureq::Error>,
        S: Fn(Duration),
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.max_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        warn!("Non-retryable error: {}", error);
                        return Err(RequestFailure::Fatal(error.to_string()));
                    }

                    warn!(
                        "Transient error: {}, attempt {}/{}",
                        error, attempt, self.max_attempts
                    );
                    last_error = Some(error.to_string());

                    if attempt < self.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        sleep(delay);
                    }
                }
            }
        }

        error!("All {} retry attempts failed", self.max_attempts);

        Err(RequestFailure::Exhausted {
            attempts: self.max_attempts,
            last_error: last_error.unwrap_or_else(|| "request failed".to_string()),
        })
    }
}

fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

//! Cold-start retry policy: which failures are retried, how long to wait,
//! and how an exhausted retry budget is reported.

use std::time::Duration;

use reqwest::StatusCode;

use crate::{ApiError, ClientOptions, RetryStatus};

const CONNECTING_MESSAGE: &str = "Connecting to server...";
const WAKING_UP_MESSAGE: &str = "Server is waking up, please wait...";

/// Bounded, short escalating retry schedule tuned to backend wake-up time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, delays: Vec<Duration>) -> Self {
        Self { max_retries, delays }
    }

    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(
            options.max_retries,
            options
                .retry_delays_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        )
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Whether another attempt is allowed after `retries_done` retries.
    pub fn allows_retry(&self, retries_done: usize) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before the 1-based `retry`. Past the schedule the last entry
    /// repeats; an empty schedule means no delay.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let index = retry.saturating_sub(1);
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Progress event announcing the 1-based `retry`.
    pub fn status_for(&self, retry: usize) -> RetryStatus {
        let message = if retry <= 1 {
            CONNECTING_MESSAGE
        } else {
            WAKING_UP_MESSAGE
        };
        RetryStatus {
            attempt: retry,
            max_retries: self.max_retries,
            message: message.to_owned(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

/// Statuses retried automatically. Only 503 signals a backend still booting.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE
}

/// Why a single attempt failed in a way worth retrying.
#[derive(Debug)]
pub(crate) enum Transient {
    TimedOut,
    Unreachable(reqwest::Error),
    Unavailable,
}

impl Transient {
    /// Final failure once no retries remain, worded by the last cause.
    pub(crate) fn exhausted(self) -> ApiError {
        match self {
            Self::TimedOut => ApiError::TimedOut,
            Self::Unreachable(source) => ApiError::Unreachable { source },
            Self::Unavailable => ApiError::StillStarting,
        }
    }

    #[cfg(feature = "tracing")]
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::TimedOut => "timeout",
            Self::Unreachable(_) => "network failure",
            Self::Unavailable => "503 service unavailable",
        }
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Reported to the caller as is.
    Terminal(ApiError),
    /// Eligible for another attempt.
    Transient(Transient),
}

impl From<ApiError> for AttemptError {
    fn from(err: ApiError) -> Self {
        Self::Terminal(err)
    }
}

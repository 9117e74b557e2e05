//! Timer primitive shared by the request timeout and the retry delay.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

/// Suspends for `duration`. Zero returns immediately.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

/// Races `work` against a timer.
///
/// Returns `None` when the timer wins. The unfinished future is dropped at
/// that point, which tears down whatever transfer it was driving.
pub(crate) async fn race<F: Future>(duration: Duration, work: F) -> Option<F::Output> {
    timeout(duration, work).await.ok()
}

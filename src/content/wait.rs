use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("page context was torn down")]
    Cancelled,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Poll `check` every `interval` until it yields a value, `timeout` elapses
/// or `cancel` fires. The check runs once immediately.
pub async fn wait_until<T, F, Fut>(
    mut check: F,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if let Some(value) = check().await {
            return Ok(value);
        }
        if Instant::now() + interval > deadline {
            return Err(WaitError::TimedOut(timeout));
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns false when cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

//! Polling helper for long-running provider operations
//!
//! Cloud APIs acknowledge a create/delete before the work is done. Awaiting
//! the terminal state is not a retry: a failed check ends the wait with that
//! error, it is never swallowed.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::Error;

/// Poll `check_fn` until it yields a value or `timeout` elapses
///
/// * `check_fn` returns `Ok(Some(value))` when the condition is met,
///   `Ok(None)` to keep polling, or `Err` to stop immediately.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    let start = Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if let Some(value) = check_fn().await? {
            return Ok(value);
        }

        if start.elapsed() >= timeout {
            return Err(Error::internal_with_context("poll_until", timeout_msg));
        }

        trace!("Polling condition not yet met");
        tokio::time::sleep(poll_interval).await;
    }
}

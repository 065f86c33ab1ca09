use crate::quineroom::client_wrapper::ClientError;
use std::future::Future;

/// Attempt budget for a chat call, counting the first try.
pub const DEFAULT_ATTEMPTS: usize = 3;

/// Run `op` up to `attempts` times, returning the first success or the last error.
///
/// There is no backoff between attempts. Errors that are not transient
/// (see [`ClientError::is_transient`]) are returned immediately.
pub async fn with_retries<T, F, Fut>(attempts: usize, mut op: F) -> Result<T, ClientError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && err.is_transient() => {
                log::warn!(
                    "quineroom::clients::common::with_retries(...): attempt {}/{} failed: {}",
                    attempt,
                    attempts,
                    err
                );
                attempt += 1;
            }
            Err(err) => {
                log::error!(
                    "quineroom::clients::common::with_retries(...): giving up after {} attempt(s): {}",
                    attempt,
                    err
                );
                return Err(err);
            }
        }
    }
}

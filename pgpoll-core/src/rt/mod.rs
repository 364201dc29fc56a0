use std::future::Future;
use std::time::Duration;

#[cfg(feature = "_rt-tokio")]
pub mod rt_tokio;

#[derive(Debug, thiserror::Error)]
#[error("operation timed out")]
pub struct TimeoutError;

/// Race `f` against a deadline.
///
/// Connections never time out on their own. To bound an operation, race it here and
/// close the connection on expiry; dropping the timed-out future releases the
/// connection's pending slot.
pub async fn timeout<F: Future>(duration: Duration, f: F) -> Result<F::Output, TimeoutError> {
    #[cfg(feature = "_rt-tokio")]
    if rt_tokio::available() {
        return tokio::time::timeout(duration, f)
            .await
            .map_err(|_| TimeoutError);
    }

    missing_rt((duration, f))
}

#[track_caller]
pub const fn missing_rt<T>(_unused: T) -> ! {
    if cfg!(feature = "_rt-tokio") {
        panic!("this functionality requires a Tokio context")
    }

    panic!("the `runtime-tokio` feature of pgpoll must be enabled")
}

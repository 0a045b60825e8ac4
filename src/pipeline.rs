//! Wiring between the stream reader and the file driver.

use std::future::Future;

use futures_util::StreamExt;
use tracing::{info, instrument, warn};

use crate::output::{DriverError, FileDriver, WriteSummary};
use crate::stream::StreamReader;

/// Streams records from `reader` into `driver` until `shutdown` resolves or
/// the reader fails permanently.
///
/// When `shutdown` resolves the record stream ends, so the driver finishes
/// the open gzip member before this returns.
///
/// # Errors
///
/// Returns [`DriverError::Upstream`] wrapping the reader's permanent error
/// (such as [`StreamError::NoActiveRules`](crate::stream::StreamError::NoActiveRules)),
/// or [`DriverError::Io`] if writing fails.
#[instrument(skip_all, fields(endpoint = %reader.endpoint(), root = %driver.root().display()))]
pub async fn collect<F>(
    reader: &StreamReader,
    driver: &FileDriver,
    shutdown: F,
) -> Result<WriteSummary, DriverError>
where
    F: Future<Output = ()>,
{
    info!("starting collection");
    let records = reader.records().take_until(shutdown);
    let records = std::pin::pin!(records);
    driver.write_all(records).await
}

/// Returns a future that resolves on Ctrl-C, or on SIGTERM on unix.
///
/// Signal handlers are installed before this returns, so a signal delivered
/// between the call and the first poll is not lost. Must be called inside a
/// tokio runtime.
///
/// # Errors
///
/// Returns the OS error if the SIGTERM handler cannot be installed.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let terminate = {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = signal(SignalKind::terminate())?;
        async move {
            terminate.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    Ok(async move {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = interrupt => info!("interrupt received, closing the current file"),
            () = terminate => info!("SIGTERM received, closing the current file"),
        }
    })
}

use std::future::Future;
use std::time::Duration;

/// Await a port call, mapping an elapsed deadline into the port's own error
pub(crate) async fn bounded<T, E, F>(limit: Duration, call: F, on_timeout: impl FnOnce() -> E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

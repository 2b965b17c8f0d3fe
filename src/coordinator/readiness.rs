//! Wait for the local CouchDB to answer

use crate::coordinator::admin::AdminApi;
use std::time::Duration;

/// Poll `api` every `interval` until it reports ready.
///
/// There is no attempt limit. Returns the number of probes made.
pub async fn wait_until_ready<A>(api: &A, interval: Duration) -> u32
where
    A: AdminApi + ?Sized,
{
    tracing::debug!("Waiting for CouchDB");

    let mut attempts = 1;
    while !api.is_ready().await {
        tracing::debug!(".");
        tokio::time::sleep(interval).await;
        attempts += 1;
    }

    tracing::info!("CouchDB is ready after {} probe(s)", attempts);
    attempts
}

//! Bounded-parallel tile download
//!
//! [`fetch_all`] loads a list of tile URLs with at most `connections`
//! requests in flight and returns the images in input order. The first
//! failure cancels everything still pending; no partial result is returned.

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::TileLoader;
use crate::fetch::FetchError;
use crate::provider::AsyncHttpClient;

/// Errors from a batch download.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("connections must be a positive integer value")]
    InvalidConnections,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A download task panicked or ended without a result
    #[error("tile download task failed: {0}")]
    TaskFailed(String),
}

/// What a download task reports back. `None` means it was cancelled.
type TaskOutput = (usize, Option<Result<RgbaImage, FetchError>>);

/// Loads every URL, returning images in the same order as `urls`.
pub async fn fetch_all<C>(
    loader: &TileLoader<C>,
    urls: &[String],
    connections: usize,
) -> Result<Vec<RgbaImage>, DispatchError>
where
    C: AsyncHttpClient + 'static,
{
    if connections == 0 {
        return Err(DispatchError::InvalidConnections);
    }
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    debug!(tiles = urls.len(), connections = connections, "Starting tile downloads");

    let limiter = Arc::new(Semaphore::new(connections));
    let cancellation_token = CancellationToken::new();
    let mut downloads: JoinSet<TaskOutput> = JoinSet::new();

    for (index, url) in urls.iter().enumerate() {
        let loader = loader.clone();
        let url = url.clone();
        let limiter = Arc::clone(&limiter);
        let token = cancellation_token.clone();

        downloads.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => return (index, None),
                permit = limiter.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (index, None),
                },
            };

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = loader.load(&url) => Some(result),
            };
            (index, result)
        });
    }

    let mut images: Vec<Option<RgbaImage>> = (0..urls.len()).map(|_| None).collect();

    while let Some(joined) = downloads.join_next().await {
        match joined {
            Ok((index, Some(Ok(image)))) => images[index] = Some(image),
            Ok((index, Some(Err(e)))) => {
                warn!(
                    url = %urls[index],
                    error = %e,
                    "Tile download failed, cancelling remaining downloads"
                );
                cancellation_token.cancel();
                downloads.abort_all();
                return Err(DispatchError::Fetch(e));
            }
            Ok((_, None)) => {}
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => {
                cancellation_token.cancel();
                downloads.abort_all();
                return Err(DispatchError::TaskFailed(join_err.to_string()));
            }
        }
    }

    images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            image.ok_or_else(|| {
                DispatchError::TaskFailed(format!("no result for {}", urls[index]))
            })
        })
        .collect()
}

//! Tile fetching with bounded retries
//!
//! [`TileFetcher`] issues the HTTP request for one tile URL, decodes the body
//! to RGBA and retries transient failures according to a [`RetryPolicy`].
//! A 404 is permanent and never retried.

mod placeholder;
mod policy;

pub use placeholder::{placeholder_tile, PLACEHOLDER_COLOR};
pub use policy::RetryPolicy;

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::AsyncHttpClient;

/// Prefix of generated user agents.
pub const USER_AGENT_PREFIX: &str = "tilemosaic-";

/// Errors from fetching a single tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The server answered 404
    #[error("Tile URL resulted in a 404 error. Double-check your tile url:\n{url}")]
    NotFound { url: String },

    /// Every allowed attempt failed
    #[error(
        "Connection reset by peer too many times. Last message was: {} Error: {reason} for url: {url}",
        display_status(.status)
    )]
    RetriesExhausted {
        url: String,
        /// Last HTTP status, `None` when no response was received
        status: Option<u16>,
        reason: String,
        attempts: u32,
    },
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |s| s.to_string())
}

/// Generates a per-session user agent, `tilemosaic-` followed by 32 hex digits.
pub fn generate_user_agent() -> String {
    format!("{}{:032x}", USER_AGENT_PREFIX, rand::random::<u128>())
}

/// Merges caller headers over a default user agent.
///
/// Header names compare case-insensitively; caller values win.
pub fn merge_headers(user_agent: &str, extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = vec![("user-agent".to_string(), user_agent.to_string())];
    for (name, value) in extra {
        merged.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        merged.push((name.clone(), value.clone()));
    }
    merged
}

/// Outcome of one failed attempt.
struct AttemptFailure {
    status: Option<u16>,
    reason: String,
}

/// Fetches and decodes tiles over HTTP.
pub struct TileFetcher<C> {
    client: Arc<C>,
    headers: Vec<(String, String)>,
    policy: RetryPolicy,
    handle_missing_tiles: bool,
    tile_size: u32,
}

impl<C> Clone for TileFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            headers: self.headers.clone(),
            policy: self.policy.clone(),
            handle_missing_tiles: self.handle_missing_tiles,
            tile_size: self.tile_size,
        }
    }
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    /// Creates a fetcher with a fresh user agent and no retries.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            headers: merge_headers(&generate_user_agent(), &[]),
            policy: RetryPolicy::None,
            handle_missing_tiles: false,
            tile_size: 256,
        }
    }

    /// Sets the user agent and caller headers sent with every request.
    pub fn with_headers(mut self, user_agent: &str, extra: &[(String, String)]) -> Self {
        self.headers = merge_headers(user_agent, extra);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Substitutes a placeholder tile for 404 responses instead of failing.
    pub fn with_missing_tile_handling(mut self, enabled: bool) -> Self {
        self.handle_missing_tiles = enabled;
        self
    }

    /// Edge length of placeholder tiles.
    pub fn with_tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Fetches one tile and decodes it to RGBA.
    pub async fn fetch_tile(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match self.client.get(url, &self.headers).await {
                Ok(resp) if resp.status == 404 => {
                    if self.handle_missing_tiles {
                        debug!(url = url, "Tile missing, using placeholder");
                        return Ok(placeholder_tile(404, self.tile_size, self.tile_size));
                    }
                    return Err(FetchError::NotFound {
                        url: url.to_string(),
                    });
                }
                Ok(resp) if resp.is_success() => match image::load_from_memory(&resp.body) {
                    Ok(img) => {
                        debug!(url = url, attempt = attempt, "Tile fetched");
                        return Ok(img.to_rgba8());
                    }
                    Err(e) => AttemptFailure {
                        status: Some(resp.status),
                        reason: format!("undecodable image: {}", e),
                    },
                },
                Ok(resp) => AttemptFailure {
                    status: Some(resp.status),
                    reason: resp.reason,
                },
                Err(e) => AttemptFailure {
                    status: None,
                    reason: e.to_string(),
                },
            };

            match self.policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    warn!(
                        url = url,
                        status = ?failure.status,
                        reason = %failure.reason,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Tile request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        url = url,
                        status = ?failure.status,
                        attempts = attempt,
                        "Tile request failed, giving up"
                    );
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        status: failure.status,
                        reason: failure.reason,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

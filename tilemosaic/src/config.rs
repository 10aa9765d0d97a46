//! Pipeline configuration.
//!
//! [`PipelineConfig`] carries everything a [`TilePipeline`](crate::pipeline::TilePipeline)
//! needs: cache location, request headers, retry budget and parallelism.
//! There is no global state; each pipeline owns its configuration.

use std::time::Duration;

use crate::cache::CacheLocation;
use crate::dispatch::DispatchError;
use crate::fetch::{generate_user_agent, RetryPolicy};
use crate::provider::{TileProvider, DEFAULT_TIMEOUT};

/// Default number of retries after a failed tile request.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default number of concurrent tile downloads.
pub const DEFAULT_CONNECTIONS: usize = 1;

/// Configuration for a tile pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Tile cache location.
    pub cache: CacheLocation,

    /// User agent sent with every request unless overridden in `headers`.
    pub user_agent: String,

    /// Extra request headers; these win over the user agent.
    pub headers: Vec<(String, String)>,

    /// Delay between a failed request and the next attempt.
    pub wait: Duration,

    /// Retries after the first failed attempt (404s are never retried).
    pub max_retries: u32,

    /// Concurrent downloads.
    pub connections: usize,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Replace tiles the server reports missing (404) with placeholders.
    /// Other failures still surface as errors.
    pub handle_missing_tiles: bool,

    /// Provider used when a request names no source.
    pub default_provider: TileProvider,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache: CacheLocation::default(),
            user_agent: generate_user_agent(),
            headers: Vec::new(),
            wait: Duration::ZERO,
            max_retries: DEFAULT_MAX_RETRIES,
            connections: DEFAULT_CONNECTIONS,
            request_timeout: DEFAULT_TIMEOUT,
            handle_missing_tiles: false,
            default_provider: TileProvider::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: CacheLocation) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_missing_tile_handling(mut self, enabled: bool) -> Self {
        self.handle_missing_tiles = enabled;
        self
    }

    pub fn with_default_provider(mut self, provider: TileProvider) -> Self {
        self.default_provider = provider;
        self
    }

    /// Retry policy derived from `max_retries` and `wait`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_retries(self.max_retries, self.wait)
    }

    /// Checks settings that would otherwise fail after work has started.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.connections == 0 {
            return Err(DispatchError::InvalidConnections);
        }
        Ok(())
    }
}

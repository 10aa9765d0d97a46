//! Tile provider abstraction
//!
//! Resolves what the caller asked for (nothing, a URL template, a provider
//! record or a local raster) into something tiles can be requested from, and
//! provides the HTTP client seam used by the fetcher.
//!
//! ```ignore
//! use tilemosaic::provider::{resolve_source, TileProvider, TileSource};
//!
//! let source = TileSource::RawUrl("https://tiles.example/{z}/{x}/{y}.png".into());
//! let resolved = resolve_source(Some(source), &TileProvider::openstreetmap_hot())?;
//! ```

mod http;
mod source;
mod template;
mod types;

pub use http::{AsyncHttpClient, HttpResponse, ReqwestClient, DEFAULT_TIMEOUT};
pub use source::{resolve_source, ResolvedSource, TileSource};
pub use types::{ProviderError, Subdomains, TileProvider};

#[cfg(test)]
pub use http::tests::{response as mock_response, MockAsyncHttpClient};

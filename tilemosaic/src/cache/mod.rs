//! URL-keyed disk cache for decoded tiles.
//!
//! Each tile is stored as a PNG at `root/<url without scheme>`, with the URL
//! split on `/` into nested directories. Cache failures never surface to the
//! caller: a failed read is a miss and a failed write is logged and ignored.
//!
//! Writes go through a temporary file in the target directory followed by a
//! rename, so concurrent writers of the same URL leave one complete file.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use tempfile::TempDir;
use tracing::{debug, trace};

use crate::fetch::{FetchError, TileFetcher};
use crate::provider::AsyncHttpClient;

/// Where tiles are cached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheLocation {
    /// Temporary directory removed when the last cache handle is dropped
    #[default]
    Session,
    /// Persistent directory (created on first write)
    Directory(PathBuf),
    /// No caching
    Disabled,
}

impl CacheLocation {
    /// Opens the cache, creating the session directory if needed.
    pub fn open(&self) -> io::Result<Option<DiskTileCache>> {
        match self {
            CacheLocation::Session => DiskTileCache::session().map(Some),
            CacheLocation::Directory(path) => Ok(Some(DiskTileCache::new(path.clone()))),
            CacheLocation::Disabled => Ok(None),
        }
    }
}

/// Disk cache of decoded tiles keyed by request URL.
#[derive(Debug, Clone)]
pub struct DiskTileCache {
    root: PathBuf,
    /// Keeps a session directory alive for as long as any clone exists
    _session: Option<Arc<TempDir>>,
}

impl DiskTileCache {
    /// Creates a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _session: None,
        }
    }

    /// Creates a cache in a fresh temporary directory.
    pub fn session() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("tilemosaic-").tempdir()?;
        debug!(path = %dir.path().display(), "Created session tile cache");
        Ok(Self {
            root: dir.path().to_path_buf(),
            _session: Some(Arc::new(dir)),
        })
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of the entry for a URL.
    ///
    /// The scheme is dropped and the rest split on `/`. Empty, `.` and `..`
    /// segments are skipped so every entry stays under the root.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        without_scheme
            .split('/')
            .filter(|segment| !matches!(*segment, "" | "." | ".."))
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Reads a cached tile. Any I/O or decode failure is a miss.
    pub async fn get(&self, url: &str) -> Option<RgbaImage> {
        let path = self.path_for(url);
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path).ok()?;
            image::load_from_memory_with_format(&bytes, ImageFormat::Png)
                .ok()
                .map(|img| img.to_rgba8())
        })
        .await
        .ok()
        .flatten()
    }

    /// Stores a tile, creating parent directories as needed.
    pub async fn put(&self, url: &str, image: &RgbaImage) -> io::Result<()> {
        let path = self.path_for(url);
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(io::Error::other)?;
        let data = encoded.into_inner();

        tokio::task::spawn_blocking(move || {
            let parent = path
                .parent()
                .ok_or_else(|| io::Error::other("cache entry has no parent directory"))?;
            std::fs::create_dir_all(parent)?;
            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            io::Write::write_all(&mut tmp, &data)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
    }
}

/// Fetcher with an optional read-through cache in front of it.
pub struct TileLoader<C> {
    fetcher: TileFetcher<C>,
    cache: Option<DiskTileCache>,
}

impl<C> Clone for TileLoader<C> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<C: AsyncHttpClient> TileLoader<C> {
    pub fn new(fetcher: TileFetcher<C>, cache: Option<DiskTileCache>) -> Self {
        Self { fetcher, cache }
    }

    /// Same fetcher, no cache.
    pub fn uncached(fetcher: TileFetcher<C>) -> Self {
        Self::new(fetcher, None)
    }

    pub fn cache(&self) -> Option<&DiskTileCache> {
        self.cache.as_ref()
    }

    /// Loads a tile from the cache, falling back to the network.
    ///
    /// Successful fetches are written back to the cache.
    pub async fn load(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let Some(cache) = &self.cache else {
            return self.fetcher.fetch_tile(url).await;
        };

        if let Some(image) = cache.get(url).await {
            trace!(url = url, "Tile cache hit");
            return Ok(image);
        }

        let image = self.fetcher.fetch_tile(url).await?;
        if let Err(e) = cache.put(url, &image).await {
            debug!(url = url, error = %e, "Failed to write tile to cache");
        }
        Ok(image)
    }
}

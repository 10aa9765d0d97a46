//! Bounding box to basemap pipeline
//!
//! [`TilePipeline`] ties the stages together:
//!
//! ```text
//! bbox ─► source ─► zoom ─► tiles ─► URLs ─► fetch_all ─► merge ─► Mosaic
//! ```
//!
//! Local GeoTIFF sources skip the tile stages: the raster is read, warped to
//! web mercator when it is in another CRS and cropped to the box.
//!
//! ```ignore
//! let pipeline = TilePipeline::new(PipelineConfig::default().with_connections(4))?;
//! let bbox = BoundingBox::geographic(-106.65, 25.85, -93.51, 36.49)?;
//! let mosaic = pipeline.bounds_to_img(&MosaicRequest::new(bbox)).await?;
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{DiskTileCache, TileLoader};
use crate::config::PipelineConfig;
use crate::coord::{
    bbox_to_window, geographic_to_projected, tiles_covering, BoundingBox, CoordError,
    CoordSystem, MAX_LAT, MAX_ZOOM, MIN_LAT,
};
use crate::dispatch::fetch_all;
use crate::error::Result;
use crate::fetch::TileFetcher;
use crate::mosaic::{merge_tiles, Mosaic};
use crate::provider::{
    resolve_source, AsyncHttpClient, ReqwestClient, ResolvedSource, TileProvider, TileSource,
};
use crate::raster::{read_geotiff, write_geotiff, AffineTransform, GeoRaster};
use crate::warp::{warp_img_transform, Crs, Resampling};
use crate::zoom::{auto_zoom, resolve_zoom, ZoomSpec};

/// EPSG code of the rasters this pipeline produces.
const OUTPUT_EPSG: u16 = 3857;

/// What to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicRequest {
    pub bbox: BoundingBox,
    pub zoom: ZoomSpec,
    /// Shift applied to an inferred zoom; ignored for explicit levels
    pub zoom_adjust: Option<i32>,
    /// `None` uses the configured default provider
    pub source: Option<TileSource>,
    /// Read and write the pipeline's tile cache
    pub use_cache: bool,
}

impl MosaicRequest {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            zoom: ZoomSpec::Auto,
            zoom_adjust: None,
            source: None,
            use_cache: true,
        }
    }

    pub fn with_zoom(mut self, zoom: ZoomSpec) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_zoom_adjust(mut self, adjust: i32) -> Self {
        self.zoom_adjust = Some(adjust);
        self
    }

    pub fn with_source(mut self, source: impl Into<TileSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Fetches and assembles basemaps.
///
/// The tile cache is opened once and shared by every call, so repeated
/// requests for the same tiles hit the network once.
pub struct TilePipeline<C = ReqwestClient> {
    config: PipelineConfig,
    client: Arc<C>,
    cache: Option<DiskTileCache>,
}

impl TilePipeline<ReqwestClient> {
    /// Creates a pipeline backed by reqwest.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = ReqwestClient::with_timeout(config.request_timeout)?;
        Self::with_client(config, client)
    }
}

impl<C: AsyncHttpClient + 'static> TilePipeline<C> {
    /// Creates a pipeline with a custom HTTP client.
    pub fn with_client(config: PipelineConfig, client: C) -> Result<Self> {
        config.validate()?;
        let cache = match config.cache.open() {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Failed to open tile cache, continuing without it");
                None
            }
        };
        if let Some(cache) = &cache {
            debug!(root = %cache.root().display(), "Tile cache ready");
        }
        Ok(Self {
            config,
            client: Arc::new(client),
            cache,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&DiskTileCache> {
        self.cache.as_ref()
    }

    fn loader(&self, provider: &TileProvider, use_cache: bool) -> TileLoader<C> {
        let fetcher = TileFetcher::new(Arc::clone(&self.client))
            .with_headers(&self.config.user_agent, &self.config.headers)
            .with_retry_policy(self.config.retry_policy())
            .with_missing_tile_handling(self.config.handle_missing_tiles)
            .with_tile_size(provider.tile_size);
        let cache = if use_cache { self.cache.clone() } else { None };
        TileLoader::new(fetcher, cache)
    }

    /// Builds the basemap covering `request.bbox`.
    ///
    /// The returned extent is in EPSG:3857 meters and covers whole tiles, so
    /// it is usually larger than the requested box.
    pub async fn bounds_to_img(&self, request: &MosaicRequest) -> Result<Mosaic> {
        self.config.validate()?;
        let source = resolve_source(request.source.clone(), &self.config.default_provider)?;
        match source {
            ResolvedSource::Web(provider) => self.fetch_mosaic(request, &provider).await,
            ResolvedSource::Local(path) => self.local_mosaic(request, path).await,
        }
    }

    async fn fetch_mosaic(&self, request: &MosaicRequest, provider: &TileProvider) -> Result<Mosaic> {
        let bbox = request.bbox.to_geographic();
        let zoom = resolve_zoom(request.zoom, request.zoom_adjust, &bbox, provider)?.zoom;

        let tiles = tiles_covering(&bbox, zoom);
        let urls = tiles
            .iter()
            .map(|tile| provider.build_url(tile))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            provider = %provider.name,
            zoom = zoom,
            tiles = tiles.len(),
            connections = self.config.connections,
            "Fetching basemap tiles"
        );

        let loader = self.loader(provider, request.use_cache);
        let images = fetch_all(&loader, &urls, self.config.connections).await?;
        let (image, bounds) = merge_tiles(&tiles, &images)?;

        Ok(Mosaic {
            image,
            extent: bounds.to_projected_extent(),
            zoom: Some(zoom),
            tile_count: tiles.len(),
        })
    }

    async fn local_mosaic(&self, request: &MosaicRequest, path: PathBuf) -> Result<Mosaic> {
        let bbox = projected_bbox(&request.bbox)?;
        debug!(path = %path.display(), "Reading local basemap");

        tokio::task::spawn_blocking(move || -> Result<Mosaic> {
            let GeoRaster {
                pixels,
                transform,
                epsg,
            } = read_geotiff(&path)?;

            // Rasters without a CRS are taken to be web mercator already.
            let source = epsg.map(Crs::Epsg).unwrap_or(Crs::WEB_MERCATOR);
            let (pixels, transform) = if source == Crs::WEB_MERCATOR {
                (pixels, transform)
            } else {
                let (bands, transform) = warp_img_transform(
                    &pixels.to_bands(),
                    &transform,
                    &source,
                    &Crs::WEB_MERCATOR,
                    Resampling::Bilinear,
                )?;
                (bands.to_pixels(), transform)
            };

            let extent = transform.extent(pixels.width(), pixels.height());
            let window = bbox_to_window(&bbox, &extent, (pixels.height(), pixels.width()));
            let image = pixels.crop(&window);
            let extent = transform
                .translate_pixels(window.col_start as f64, window.row_start as f64)
                .extent(image.width(), image.height());

            Ok(Mosaic {
                image,
                extent,
                zoom: None,
                tile_count: 0,
            })
        })
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
    }

    /// Builds the basemap and writes it to `path` as an EPSG:3857 GeoTIFF.
    pub async fn bounds_to_raster(
        &self,
        request: &MosaicRequest,
        path: impl AsRef<Path>,
    ) -> Result<Mosaic> {
        let mosaic = self.bounds_to_img(request).await?;
        let path = path.as_ref().to_path_buf();
        let transform =
            AffineTransform::from_extent(&mosaic.extent, mosaic.image.width(), mosaic.image.height());

        let mosaic = tokio::task::spawn_blocking(move || -> Result<Mosaic> {
            write_geotiff(&path, &mosaic.image, &transform, OUTPUT_EPSG)?;
            info!(path = %path.display(), "Wrote basemap raster");
            Ok(mosaic)
        })
        .await
        .map_err(|e| io::Error::other(e.to_string()))??;
        Ok(mosaic)
    }
}

/// Converts a box to web mercator, clamping latitudes to the mercator range.
fn projected_bbox(bbox: &BoundingBox) -> std::result::Result<BoundingBox, CoordError> {
    match bbox.system {
        CoordSystem::Projected => Ok(*bbox),
        CoordSystem::Geographic => {
            let (west, south) = geographic_to_projected(bbox.west, bbox.south.max(MIN_LAT));
            let (east, north) = geographic_to_projected(bbox.east, bbox.north.min(MAX_LAT));
            BoundingBox::projected(west, south, east, north)
        }
    }
}

/// Zoom level and number of tiles a request for `bbox` would download.
pub fn howmany(bbox: &BoundingBox, zoom: ZoomSpec) -> Result<(u8, usize)> {
    let bbox = bbox.to_geographic();
    let zoom = match zoom {
        ZoomSpec::Auto => auto_zoom(&bbox).clamp(0, i32::from(MAX_ZOOM)) as u8,
        ZoomSpec::Level(level) if level > MAX_ZOOM => {
            return Err(CoordError::InvalidZoom(level).into())
        }
        ZoomSpec::Level(level) => level,
    };
    let count = tiles_covering(&bbox, zoom).len();
    info!(
        zoom = zoom,
        tiles = count,
        "Using zoom level {}, this will download {} tiles",
        zoom,
        count
    );
    Ok((zoom, count))
}

//! Integration tests for the tile pipeline.
//!
//! These tests drive `TilePipeline` end to end against an in-memory tile
//! server:
//! - retry budget and error reporting
//! - disk cache hits across calls and pipelines
//! - mosaic shape and content
//! - GeoTIFF output
//!
//! Run with: `cargo test --test pipeline_integration`

mod common;

use std::time::Duration;

use tempfile::TempDir;

use common::MockTileServer;
use tilemosaic::cache::CacheLocation;
use tilemosaic::fetch::{FetchError, PLACEHOLDER_COLOR};
use tilemosaic::raster::read_geotiff;
use tilemosaic::{
    howmany, BoundingBox, MosaicRequest, PipelineConfig, TileMosaicError, TilePipeline,
    TileProvider, TileSource, ZoomSpec,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Roughly the state of Texas.
fn texas() -> BoundingBox {
    BoundingBox::geographic(-106.65, 25.85, -93.51, 36.49).unwrap()
}

/// Box covered by a single tile at zoom 2.
fn single_tile_box() -> BoundingBox {
    BoundingBox::geographic(-100.0, 30.0, -95.0, 35.0).unwrap()
}

fn provider() -> TileProvider {
    TileProvider::new("mock", "https://tiles.example/{z}/{x}/{y}.png")
}

fn config() -> PipelineConfig {
    PipelineConfig::new()
        .with_cache(CacheLocation::Disabled)
        .with_default_provider(provider())
        .with_wait(Duration::from_millis(1))
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_server_error_retried_then_reported() {
    let server = MockTileServer::status(503, "Service Unavailable");
    let pipeline = TilePipeline::with_client(config(), server.clone()).unwrap();

    let bbox = single_tile_box();
    assert_eq!(howmany(&bbox, ZoomSpec::Level(2)).unwrap(), (2, 1));

    let request = MosaicRequest::new(bbox).with_zoom(ZoomSpec::Level(2));
    let err = pipeline.bounds_to_img(&request).await.unwrap_err();

    // One initial attempt plus the default two retries
    assert_eq!(server.calls(), 3);
    let message = err.to_string();
    assert!(
        message.starts_with("Connection reset by peer too many times. Last message was: 503"),
        "{message}"
    );
    assert!(message.contains("https://tiles.example/2/0/1.png"), "{message}");
    assert!(matches!(
        err.fetch_error(),
        Some(FetchError::RetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_retry_budget_follows_config() {
    let server = MockTileServer::status(500, "Internal Server Error");
    let pipeline =
        TilePipeline::with_client(config().with_max_retries(0), server.clone()).unwrap();

    let request = MosaicRequest::new(single_tile_box()).with_zoom(ZoomSpec::Level(2));
    pipeline.bounds_to_img(&request).await.unwrap_err();
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockTileServer::status(404, "Not Found");
    let pipeline = TilePipeline::with_client(config(), server.clone()).unwrap();

    let request = MosaicRequest::new(single_tile_box()).with_zoom(ZoomSpec::Level(2));
    let err = pipeline.bounds_to_img(&request).await.unwrap_err();

    assert_eq!(server.calls(), 1);
    assert!(matches!(err.fetch_error(), Some(FetchError::NotFound { .. })));
}

#[tokio::test]
async fn test_missing_tiles_become_placeholders() {
    let server = MockTileServer::status(404, "Not Found");
    let config = config().with_missing_tile_handling(true);
    let pipeline = TilePipeline::with_client(config, server).unwrap();

    let request = MosaicRequest::new(single_tile_box()).with_zoom(ZoomSpec::Level(2));
    let mosaic = pipeline.bounds_to_img(&request).await.unwrap();

    assert_eq!(mosaic.image.shape(), (256, 256, 4));
    assert_eq!(mosaic.image.pixel(0, 0), &PLACEHOLDER_COLOR.0);
}

#[tokio::test]
async fn test_placeholders_only_replace_missing_tiles() {
    let server = MockTileServer::status(503, "Service Unavailable");
    let config = config().with_missing_tile_handling(true);
    let pipeline = TilePipeline::with_client(config, server.clone()).unwrap();

    let request = MosaicRequest::new(single_tile_box()).with_zoom(ZoomSpec::Level(2));
    let err = pipeline.bounds_to_img(&request).await.unwrap_err();

    assert_eq!(server.calls(), 3);
    assert!(matches!(
        err.fetch_error(),
        Some(FetchError::RetriesExhausted { attempts: 3, .. })
    ));
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_cache_serves_repeated_requests() {
    let dir = TempDir::new().unwrap();
    let server = MockTileServer::solid([1, 2, 3, 255], 256);
    let config = config().with_cache(CacheLocation::Directory(dir.path().to_path_buf()));
    let pipeline = TilePipeline::with_client(config.clone(), server.clone()).unwrap();

    let request = MosaicRequest::new(texas()).with_zoom(ZoomSpec::Level(5));
    let first = pipeline.bounds_to_img(&request).await.unwrap();
    let tiles = server.calls();
    assert_eq!(tiles, first.tile_count);

    let second = pipeline.bounds_to_img(&request).await.unwrap();
    assert_eq!(server.calls(), tiles);
    assert_eq!(first, second);

    // A new pipeline on the same directory reuses the files
    let other = TilePipeline::with_client(config, server.clone()).unwrap();
    other.bounds_to_img(&request).await.unwrap();
    assert_eq!(server.calls(), tiles);

    assert!(dir.path().join("tiles.example/5").is_dir());
}

#[tokio::test]
async fn test_cache_disabled_per_request() {
    let server = MockTileServer::solid([1, 2, 3, 255], 256);
    let pipeline = TilePipeline::with_client(
        config().with_cache(CacheLocation::Session),
        server.clone(),
    )
    .unwrap();

    let request = MosaicRequest::new(single_tile_box())
        .with_zoom(ZoomSpec::Level(2))
        .with_cache(false);
    pipeline.bounds_to_img(&request).await.unwrap();
    pipeline.bounds_to_img(&request).await.unwrap();
    assert_eq!(server.calls(), 2);
    assert_eq!(server.calls_for("https://tiles.example/2/0/1.png"), 2);
}

// ============================================================================
// Mosaic
// ============================================================================

#[tokio::test]
async fn test_texas_mosaic_from_solid_tiles() {
    let color = [12u8, 34, 56, 255];
    let server = MockTileServer::solid(color, 256);
    let pipeline =
        TilePipeline::with_client(config().with_connections(4), server.clone()).unwrap();

    let request = MosaicRequest::new(texas()).with_zoom(ZoomSpec::Level(6));
    let mosaic = pipeline.bounds_to_img(&request).await.unwrap();

    let (height, width, bands) = mosaic.image.shape();
    assert_eq!(bands, 4);
    assert_eq!(height % 256, 0);
    assert_eq!(width % 256, 0);
    assert_eq!(mosaic.tile_count, server.calls());
    assert_eq!(mosaic.tile_count, (height / 256) * (width / 256));

    let expected: u64 = mosaic.tile_count as u64
        * 256
        * 256
        * color.iter().map(|&c| u64::from(c)).sum::<u64>();
    let actual: u64 = mosaic.image.as_slice().iter().map(|&v| u64::from(v)).sum();
    assert_eq!(actual, expected);

    // The whole-tile extent covers the requested box
    let (left, bottom) = tilemosaic::coord::geographic_to_projected(-106.65, 25.85);
    let (right, top) = tilemosaic::coord::geographic_to_projected(-93.51, 36.49);
    assert!(mosaic.extent.left <= left && mosaic.extent.right >= right);
    assert!(mosaic.extent.bottom <= bottom && mosaic.extent.top >= top);
}

#[tokio::test]
async fn test_antimeridian_box_stays_narrow() {
    let color = [70u8, 80, 90, 255];
    let server = MockTileServer::solid(color, 256);
    let pipeline = TilePipeline::with_client(config(), server.clone()).unwrap();

    let bbox = BoundingBox::geographic(179.8, -0.2, -179.8, 0.2).unwrap();
    let request = MosaicRequest::new(bbox).with_zoom(ZoomSpec::Level(8));
    let mosaic = pipeline.bounds_to_img(&request).await.unwrap();

    // 0.4 degrees straddling 180 at 1.40625 degrees per tile: two columns, two rows
    assert_eq!(server.calls(), 4);
    assert_eq!(mosaic.image.shape(), (512, 512, 4));
    assert!(mosaic
        .image
        .as_slice()
        .chunks_exact(4)
        .all(|p| p == color));

    let tile_width = 2.0 * std::f64::consts::PI * 6_378_137.0 / 256.0;
    assert!((mosaic.extent.width() - 2.0 * tile_width).abs() < 1e-6);
    let (left, _) = tilemosaic::coord::geographic_to_projected(179.8, 0.0);
    let (right, _) = tilemosaic::coord::geographic_to_projected(180.2, 0.0);
    assert!(mosaic.extent.left <= left && mosaic.extent.right >= right);
}

#[tokio::test]
async fn test_projected_box_matches_geographic_box() {
    let server = MockTileServer::solid([9, 9, 9, 255], 256);
    let pipeline = TilePipeline::with_client(config(), server).unwrap();

    let geographic = texas();
    let (west, south) = tilemosaic::coord::geographic_to_projected(-106.65, 25.85);
    let (east, north) = tilemosaic::coord::geographic_to_projected(-93.51, 36.49);
    let projected = BoundingBox::projected(west, south, east, north).unwrap();

    let a = pipeline
        .bounds_to_img(&MosaicRequest::new(geographic).with_zoom(ZoomSpec::Level(5)))
        .await
        .unwrap();
    let b = pipeline
        .bounds_to_img(&MosaicRequest::new(projected).with_zoom(ZoomSpec::Level(5)))
        .await
        .unwrap();
    assert_eq!(a.tile_count, b.tile_count);
    assert_eq!(a.image.shape(), b.image.shape());
}

#[tokio::test]
async fn test_raw_url_source() {
    let server = MockTileServer::solid([0, 0, 0, 255], 256);
    let pipeline = TilePipeline::with_client(config(), server.clone()).unwrap();

    let request = MosaicRequest::new(single_tile_box())
        .with_zoom(ZoomSpec::Level(2))
        .with_source(TileSource::RawUrl(
            "https://raw.example/tileZ/tileX/tileY.png".to_string(),
        ));
    pipeline.bounds_to_img(&request).await.unwrap();
    assert_eq!(server.calls_for("https://raw.example/2/0/1.png"), 1);
}

// ============================================================================
// Zoom and tile counts
// ============================================================================

#[tokio::test]
async fn test_inferred_zoom_clamped_to_provider_max() {
    let server = MockTileServer::solid([0, 0, 0, 255], 256);
    let capped = provider().with_max_zoom(3);
    let pipeline =
        TilePipeline::with_client(config().with_default_provider(capped), server).unwrap();

    let mosaic = pipeline
        .bounds_to_img(&MosaicRequest::new(texas()))
        .await
        .unwrap();
    assert_eq!(mosaic.zoom, Some(3));
}

#[tokio::test]
async fn test_explicit_zoom_beyond_provider_max_fails() {
    let server = MockTileServer::solid([0, 0, 0, 255], 256);
    let capped = provider().with_max_zoom(3);
    let pipeline = TilePipeline::with_client(
        config().with_default_provider(capped),
        server.clone(),
    )
    .unwrap();

    let request = MosaicRequest::new(texas()).with_zoom(ZoomSpec::Level(5));
    let err = pipeline.bounds_to_img(&request).await.unwrap_err();
    assert!(matches!(err, TileMosaicError::Zoom(_)));
    assert_eq!(server.calls(), 0);
}

#[test]
fn test_howmany_matches_fetch() {
    let (zoom, count) = howmany(&texas(), ZoomSpec::Level(6)).unwrap();
    assert_eq!(zoom, 6);
    assert!(count > 1);

    let (auto, _) = howmany(&texas(), ZoomSpec::Auto).unwrap();
    assert_eq!(auto, 6);
}

// ============================================================================
// Raster output
// ============================================================================

#[tokio::test]
async fn test_bounds_to_raster_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("texas.tif");
    let server = MockTileServer::solid([40, 80, 120, 255], 256);
    let pipeline = TilePipeline::with_client(config(), server).unwrap();

    let request = MosaicRequest::new(texas()).with_zoom(ZoomSpec::Level(5));
    let mosaic = pipeline.bounds_to_raster(&request, &path).await.unwrap();

    let raster = read_geotiff(&path).unwrap();
    assert_eq!(raster.epsg, Some(3857));
    assert_eq!(raster.pixels, mosaic.image);

    let extent = raster
        .transform
        .extent(raster.pixels.width(), raster.pixels.height());
    assert!((extent.left - mosaic.extent.left).abs() < 1e-6);
    assert!((extent.right - mosaic.extent.right).abs() < 1e-6);
    assert!((extent.bottom - mosaic.extent.bottom).abs() < 1e-6);
    assert!((extent.top - mosaic.extent.top).abs() < 1e-6);

    // The written raster can be read back as a local source
    let local = pipeline
        .bounds_to_img(&MosaicRequest::new(texas()).with_source(TileSource::LocalFile(path)))
        .await
        .unwrap();
    assert_eq!(local.zoom, None);
    assert!(local.image.width() <= mosaic.image.width());
    assert!(local
        .image
        .as_slice()
        .chunks_exact(4)
        .all(|p| p == [40, 80, 120, 255]));
}

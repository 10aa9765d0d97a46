//! Integration tests for reprojection of fetched mosaics.
//!
//! Run with: `cargo test --test warp_integration`

mod common;

use common::MockTileServer;
use tilemosaic::cache::CacheLocation;
use tilemosaic::coord::{geographic_to_projected, Extent};
use tilemosaic::raster::{AffineTransform, PixelArray};
use tilemosaic::{
    warp_img_transform, warp_tiles, BoundingBox, Crs, MosaicRequest, PipelineConfig,
    Resampling, TilePipeline, TileProvider, ZoomSpec,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Tiles west of the prime meridian are red, the rest blue.
fn split_server() -> MockTileServer {
    let red = bytes::Bytes::from(common::solid_png(RED, 256));
    let blue = bytes::Bytes::from(common::solid_png(BLUE, 256));
    MockTileServer::new(move |url| {
        // https://tiles.example/{z}/{x}/{y}.png
        let parts: Vec<u32> = url
            .trim_end_matches(".png")
            .rsplit('/')
            .take(3)
            .filter_map(|p| p.parse().ok())
            .collect();
        let (x, z) = (parts[1], parts[2]);
        let body = if x < (1 << z) / 2 { red.clone() } else { blue.clone() };
        common::response(200, "OK", body)
    })
}

fn sample(image: &PixelArray, transform: &AffineTransform, x: f64, y: f64) -> Vec<u8> {
    let (col, row) = transform.inverse().unwrap().apply(x, y);
    image.pixel(row as usize, col as usize).to_vec()
}

#[tokio::test]
async fn test_fetched_mosaic_warps_to_geographic() {
    let config = PipelineConfig::new()
        .with_cache(CacheLocation::Disabled)
        .with_default_provider(TileProvider::new(
            "split",
            "https://tiles.example/{z}/{x}/{y}.png",
        ));
    let pipeline = TilePipeline::with_client(config, split_server()).unwrap();

    let bbox = BoundingBox::geographic(-30.0, -30.0, 30.0, 30.0).unwrap();
    let mosaic = pipeline
        .bounds_to_img(&MosaicRequest::new(bbox).with_zoom(ZoomSpec::Level(3)))
        .await
        .unwrap();

    let (image, extent) =
        warp_tiles(&mosaic.image, mosaic.extent, &Crs::WGS84, Resampling::Nearest).unwrap();
    assert_eq!(image.bands(), 4);
    assert!(extent.left <= -30.0 && extent.right >= 30.0);
    assert!(extent.bottom <= -30.0 && extent.top >= 30.0);
    assert!(extent.top < 90.0);

    let transform = AffineTransform::from_origin(
        extent.left,
        extent.top,
        extent.width() / image.width() as f64,
        extent.height() / image.height() as f64,
    );
    assert_eq!(sample(&image, &transform, -20.0, 10.0), RED);
    assert_eq!(sample(&image, &transform, 20.0, -10.0), BLUE);
}

#[test]
fn test_geographic_raster_round_trip() {
    // 90x90 degree raster: left half red, right half blue
    let mut data = Vec::new();
    for _row in 0..90 {
        for col in 0..90 {
            data.extend_from_slice(if col < 45 { &RED } else { &BLUE });
        }
    }
    let pixels = PixelArray::from_vec(90, 90, 4, data).unwrap();
    let transform = AffineTransform::from_origin(-45.0, 45.0, 1.0, 1.0);

    let (mercator, mercator_transform) = warp_img_transform(
        &pixels.to_bands(),
        &transform,
        &Crs::WGS84,
        &Crs::WEB_MERCATOR,
        Resampling::Bilinear,
    )
    .unwrap();
    let mercator = mercator.to_pixels();

    let (x, y) = geographic_to_projected(-30.0, 20.0);
    assert_eq!(sample(&mercator, &mercator_transform, x, y), RED);
    let (x, y) = geographic_to_projected(30.0, -20.0);
    assert_eq!(sample(&mercator, &mercator_transform, x, y), BLUE);

    let extent: Extent = mercator_transform.extent(mercator.width(), mercator.height());
    let (left, bottom) = geographic_to_projected(-45.0, -45.0);
    assert!((extent.left - left).abs() < 1e-3, "{extent:?}");
    assert!((extent.bottom - bottom).abs() < 1e-3, "{extent:?}");

    let (back, back_transform) = warp_img_transform(
        &mercator.to_bands(),
        &mercator_transform,
        &Crs::WEB_MERCATOR,
        &"EPSG:4326".parse().unwrap(),
        Resampling::Nearest,
    )
    .unwrap();
    let back = back.to_pixels();
    assert_eq!(sample(&back, &back_transform, -30.0, 20.0), RED);
    assert_eq!(sample(&back, &back_transform, 30.0, -20.0), BLUE);
}

#[test]
fn test_unsupported_resampling_name() {
    let err = "average".parse::<Resampling>().unwrap_err();
    assert!(err.to_string().contains("average"));
}

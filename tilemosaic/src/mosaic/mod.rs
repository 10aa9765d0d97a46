//! Mosaic compositing
//!
//! Places downloaded tiles on one canvas by their column and row offsets from
//! the north-west-most tile. Columns wrap around the antimeridian: the canvas
//! starts after the widest run of unused columns, so the two halves of a box
//! crossing ±180° sit side by side and the extent runs past 180° east.
//! Tiles are not otherwise checked for contiguity, and gaps stay zero-filled.

use image::RgbaImage;
use thiserror::Error;

use crate::coord::{tile_bounds, Extent, LngLatBbox, Tile};
use crate::raster::PixelArray;

/// Errors from compositing tiles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MosaicError {
    #[error("no tiles to merge")]
    Empty,

    #[error("got {tiles} tiles but {images} images")]
    LengthMismatch { tiles: usize, images: usize },

    #[error("tile {index} is {actual:?} pixels, expected {expected:?}")]
    TileSizeMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("tiles span zoom levels {first} and {other}")]
    MixedZoom { first: u8, other: u8 },
}

/// A merged basemap image with its spherical mercator extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    /// `height x width x 4` RGBA pixels
    pub image: PixelArray,
    /// Extent in EPSG:3857 meters
    pub extent: Extent,
    /// Tile zoom level, `None` for a mosaic cut from a local raster
    pub zoom: Option<u8>,
    /// Number of tiles merged into the image
    pub tile_count: usize,
}

/// Merges tiles into one RGBA canvas.
///
/// `images[i]` is the imagery for `tiles[i]`. Returns the canvas and the
/// geographic union of the tile bounds.
pub fn merge_tiles(
    tiles: &[Tile],
    images: &[RgbaImage],
) -> Result<(PixelArray, LngLatBbox), MosaicError> {
    if tiles.len() != images.len() {
        return Err(MosaicError::LengthMismatch {
            tiles: tiles.len(),
            images: images.len(),
        });
    }
    let (Some(first_tile), Some(first_image)) = (tiles.first(), images.first()) else {
        return Err(MosaicError::Empty);
    };

    let (tile_w, tile_h) = first_image.dimensions();
    for (index, (tile, image)) in tiles.iter().zip(images).enumerate() {
        if image.dimensions() != (tile_w, tile_h) {
            return Err(MosaicError::TileSizeMismatch {
                index,
                expected: (tile_w, tile_h),
                actual: image.dimensions(),
            });
        }
        if tile.z != first_tile.z {
            return Err(MosaicError::MixedZoom {
                first: first_tile.z,
                other: tile.z,
            });
        }
    }

    let zoom = first_tile.z;
    let n = Tile::tiles_per_axis(zoom);
    let (start_x, cols) = column_layout(tiles, n);
    let min_y = tiles.iter().map(|t| t.y).min().unwrap_or(0);
    let rows = (tiles.iter().map(|t| t.y).max().unwrap_or(0) - min_y) as usize + 1;

    let (tile_w, tile_h) = (tile_w as usize, tile_h as usize);
    let mut canvas = PixelArray::zeros(rows * tile_h, cols as usize * tile_w, 4);
    let row_bytes = tile_w * 4;

    for (tile, image) in tiles.iter().zip(images) {
        let column = (u64::from(tile.x) + n - start_x) % n;
        let col_off = column as usize * tile_w;
        let row_off = (tile.y - min_y) as usize * tile_h;
        for (r, src) in image.as_raw().chunks_exact(row_bytes).enumerate() {
            let dst = canvas.row_mut(row_off + r);
            dst[col_off * 4..col_off * 4 + row_bytes].copy_from_slice(src);
        }
    }

    let lon = |x: u64| x as f64 / n as f64 * 360.0 - 180.0;
    let latitudes = tiles
        .iter()
        .map(tile_bounds)
        .reduce(|acc, b| acc.union(&b))
        .unwrap_or_else(|| tile_bounds(first_tile));
    let extent = LngLatBbox {
        west: lon(start_x),
        east: lon(start_x + cols),
        ..latitudes
    };

    Ok((canvas, extent))
}

/// First canvas column and number of columns for a set of tiles.
///
/// The layout begins right after the widest gap between occupied columns,
/// measured around the wrapped x axis. A gap across the antimeridian that is
/// no wider than the others keeps the plain west-to-east order.
fn column_layout(tiles: &[Tile], n: u64) -> (u64, u64) {
    let mut xs: Vec<u64> = tiles.iter().map(|t| u64::from(t.x)).collect();
    xs.sort_unstable();
    xs.dedup();

    let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
        return (0, 1);
    };
    let mut start = first;
    let mut widest = first + n - last;
    for pair in xs.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest {
            widest = gap;
            start = pair[1];
        }
    }
    (start, n - widest + 1)
}

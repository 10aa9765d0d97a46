//! Coordinate conversion module
//!
//! Conversions between geographic coordinates (longitude/latitude), spherical
//! mercator meters (EPSG:3857) and XYZ tile indices, plus tile enumeration
//! for a bounding box.

mod types;
mod window;

pub use types::{
    BoundingBox, CoordError, CoordSystem, Extent, LngLatBbox, MultiBox, Tile, MAX_LAT, MAX_LON,
    MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};
pub use window::{bbox_to_window, Window};

use std::f64::consts::PI;

/// Equatorial radius of the spherical mercator model, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Nudge applied to fractional tile positions before flooring.
const EPSILON: f64 = 1e-14;

/// Inset applied to the lower-right corner so that an edge lying exactly on
/// a tile boundary does not pull in the neighbouring tile.
const LL_EPSILON: f64 = 1e-11;

/// Converts spherical mercator meters to longitude/latitude degrees.
#[inline]
pub fn projected_to_geographic(x: f64, y: f64) -> (f64, f64) {
    let shift = PI * EARTH_RADIUS;
    let lon = x / shift * 180.0;
    let lat = y / shift * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

/// Converts longitude/latitude degrees to spherical mercator meters.
///
/// Latitudes of ±90° map to ±infinity on the y axis.
#[inline]
pub fn geographic_to_projected(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = if lat <= -90.0 {
        f64::NEG_INFINITY
    } else if lat >= 90.0 {
        f64::INFINITY
    } else {
        EARTH_RADIUS * (PI * 0.25 + 0.5 * lat.to_radians()).tan().ln()
    };
    (x, y)
}

/// Fractional position of a point on the unit mercator square.
///
/// `(0, 0)` is the north-west corner, `(1, 1)` the south-east one.
fn unit_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon / 360.0 + 0.5;
    let sinlat = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sinlat) / (1.0 - sinlat)).ln() / PI;
    (x, y)
}

fn axis_index(fraction: f64, n: f64) -> u32 {
    if fraction.is_nan() || fraction <= 0.0 {
        0
    } else if fraction >= 1.0 {
        (n - 1.0) as u32
    } else {
        ((fraction + EPSILON) * n).floor().min(n - 1.0) as u32
    }
}

/// Returns the tile containing a point at the given zoom.
///
/// Positions outside the mercator square are clamped to the edge tiles;
/// callers are expected to clamp latitude to ±85.051129 first.
///
/// # Panics
///
/// Never; zooms above [`MAX_ZOOM`] are clamped.
pub fn geographic_to_tile(lon: f64, lat: f64, zoom: u8) -> Tile {
    let zoom = zoom.min(MAX_ZOOM);
    let n = Tile::tiles_per_axis(zoom) as f64;
    let (fx, fy) = unit_mercator(lon, lat);
    Tile {
        x: axis_index(fx, n),
        y: axis_index(fy, n),
        z: zoom,
    }
}

/// Geographic bounds of a tile.
pub fn tile_bounds(tile: &Tile) -> LngLatBbox {
    let n = Tile::tiles_per_axis(tile.z) as f64;
    let lon = |x: f64| x / n * 360.0 - 180.0;
    let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    LngLatBbox {
        west: lon(tile.x as f64),
        south: lat(tile.y as f64 + 1.0),
        east: lon(tile.x as f64 + 1.0),
        north: lat(tile.y as f64),
    }
}

/// Lists the tiles intersecting a bounding box at a zoom level.
///
/// Projected boxes are converted to degrees first. Antimeridian-crossing boxes
/// are split and each half is enumerated separately, western half first.
/// Within a half tiles are ordered column by column (x outer, y inner).
pub fn tiles_covering(bbox: &BoundingBox, zoom: u8) -> Vec<Tile> {
    let geographic = bbox.to_geographic();
    let mut tiles = Vec::new();

    for part in geographic.normalize().iter() {
        let west = part.west.max(MIN_LON);
        let south = part.south.max(MIN_LAT);
        let east = part.east.min(MAX_LON);
        let north = part.north.min(MAX_LAT);

        let ul = geographic_to_tile(west, north, zoom);
        let lr = geographic_to_tile(east - LL_EPSILON, south + LL_EPSILON, zoom);

        // A zero-width or zero-height box still yields its enclosing tile.
        let max_x = lr.x.max(ul.x);
        let max_y = lr.y.max(ul.y);

        for x in ul.x..=max_x {
            for y in ul.y..=max_y {
                tiles.push(Tile { x, y, z: ul.z });
            }
        }
    }

    tiles
}

//! Coordinate type definitions

use std::fmt;

use thiserror::Error;

/// Web Mercator valid latitude range (tiling clamps to these).
pub const MIN_LAT: f64 = -85.051129;
pub const MAX_LAT: f64 = 85.051129;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels addressable by a [`Tile`]
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// Errors that can occur when building coordinates, boxes or tiles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// A bounding box edge is NaN or infinite
    #[error("Bounding box edges must be finite: ({west}, {south}, {east}, {north})")]
    NonFinite {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },

    /// South edge lies above the north edge
    #[error("Invalid bounding box: south ({south}) is greater than north ({north})")]
    InvertedLatitude { south: f64, north: f64 },

    /// West edge lies east of the east edge in a projected box
    #[error("Invalid projected bounding box: west ({west}) is greater than east ({east})")]
    InvertedLongitude { west: f64, east: f64 },

    /// Zoom level is outside 0..=30
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Tile index exceeds 2^zoom - 1 on one of the axes
    #[error("Tile {x}/{y} does not exist at zoom {z}")]
    TileOutOfRange { x: u32, y: u32, z: u8 },
}

/// Tile coordinates in the Web Mercator / Slippy Map system.
///
/// `x` grows eastward from the antimeridian, `y` grows southward from the
/// northern mercator limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    /// Column (0 at west)
    pub x: u32,
    /// Row (0 at north)
    pub y: u32,
    /// Zoom level (0-30)
    pub z: u8,
}

impl Tile {
    /// Creates a tile, checking that both indices exist at the zoom level.
    pub fn new(x: u32, y: u32, z: u8) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let n = Self::tiles_per_axis(z);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(CoordError::TileOutOfRange { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    /// Number of tiles along one axis at the given zoom.
    #[inline]
    pub fn tiles_per_axis(zoom: u8) -> u64 {
        1u64 << zoom
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Units a [`BoundingBox`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordSystem {
    /// Longitude / latitude in degrees (EPSG:4326)
    Geographic,
    /// Spherical mercator meters (EPSG:3857)
    Projected,
}

/// An axis-aligned box in either geographic or projected coordinates.
///
/// A geographic box whose `west` is greater than its `east` crosses the
/// antimeridian; [`BoundingBox::normalize`] splits it into two boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub system: CoordSystem,
}

impl BoundingBox {
    /// Creates a box in longitude / latitude degrees.
    pub fn geographic(west: f64, south: f64, east: f64, north: f64) -> Result<Self, CoordError> {
        Self::new(west, south, east, north, CoordSystem::Geographic)
    }

    /// Creates a box in spherical mercator meters.
    pub fn projected(west: f64, south: f64, east: f64, north: f64) -> Result<Self, CoordError> {
        Self::new(west, south, east, north, CoordSystem::Projected)
    }

    fn new(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        system: CoordSystem,
    ) -> Result<Self, CoordError> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(CoordError::NonFinite {
                west,
                south,
                east,
                north,
            });
        }
        if south > north {
            return Err(CoordError::InvertedLatitude { south, north });
        }
        if system == CoordSystem::Projected && west > east {
            return Err(CoordError::InvertedLongitude { west, east });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
            system,
        })
    }

    /// True for geographic boxes that wrap across the ±180° meridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.system == CoordSystem::Geographic && self.west > self.east
    }

    /// Returns the same box in geographic degrees.
    pub fn to_geographic(&self) -> BoundingBox {
        match self.system {
            CoordSystem::Geographic => *self,
            CoordSystem::Projected => {
                let (west, south) = super::projected_to_geographic(self.west, self.south);
                let (east, north) = super::projected_to_geographic(self.east, self.north);
                BoundingBox {
                    west,
                    south,
                    east,
                    north,
                    system: CoordSystem::Geographic,
                }
            }
        }
    }

    /// Width along the x axis, accounting for antimeridian wrap.
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            (MAX_LON - self.west) + (self.east - MIN_LON)
        } else {
            self.east - self.west
        }
    }

    /// Height along the y axis.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Splits an antimeridian-crossing box into its western and eastern parts.
    pub fn normalize(&self) -> MultiBox {
        if !self.crosses_antimeridian() {
            return MultiBox::Single(*self);
        }
        let west_part = BoundingBox {
            west: MIN_LON,
            east: self.east,
            ..*self
        };
        let east_part = BoundingBox {
            west: self.west,
            east: MAX_LON,
            ..*self
        };
        MultiBox::Split(west_part, east_part)
    }
}

/// One box, or the two halves of a box split at the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiBox {
    Single(BoundingBox),
    /// `(-180..east, west..180)`
    Split(BoundingBox, BoundingBox),
}

impl MultiBox {
    /// Number of boxes (1 or 2).
    pub fn len(&self) -> usize {
        match self {
            MultiBox::Single(_) => 1,
            MultiBox::Split(_, _) => 2,
        }
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the contained boxes, western part first.
    pub fn iter(&self) -> impl Iterator<Item = BoundingBox> {
        let parts = match *self {
            MultiBox::Single(b) => [Some(b), None],
            MultiBox::Split(a, b) => [Some(a), Some(b)],
        };
        parts.into_iter().flatten()
    }
}

/// Geographic bounds of a tile or a union of tiles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBbox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBbox {
    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &LngLatBbox) -> LngLatBbox {
        LngLatBbox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// Converts the corners to spherical mercator meters.
    pub fn to_projected_extent(&self) -> Extent {
        let (left, bottom) = super::geographic_to_projected(self.west, self.south);
        let (right, top) = super::geographic_to_projected(self.east, self.north);
        Extent {
            left,
            right,
            bottom,
            top,
        }
    }
}

/// Raster extent as `(left, right, bottom, top)` in CRS units.
///
/// This is the ordering plotting libraries expect for image extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

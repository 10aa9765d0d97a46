//! Pixel windows of a bounding box inside a georeferenced raster.

use super::{BoundingBox, Extent};

/// Half-open pixel ranges `[row_start, row_stop) x [col_start, col_stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_start: usize,
    pub row_stop: usize,
    pub col_start: usize,
    pub col_stop: usize,
}

impl Window {
    pub fn height(&self) -> usize {
        self.row_stop.saturating_sub(self.row_start)
    }

    pub fn width(&self) -> usize {
        self.col_stop.saturating_sub(self.col_start)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }
}

/// Index of the first of `count` evenly spaced samples over `[start, stop]`
/// that is greater than or equal to `value`.
fn search_sorted(start: f64, stop: f64, count: usize, value: f64) -> usize {
    if count == 0 {
        return 0;
    }
    if count == 1 {
        return usize::from(start < value);
    }
    let step = (stop - start) / (count - 1) as f64;
    (0..count)
        .position(|i| start + step * i as f64 >= value)
        .unwrap_or(count)
}

/// Pixel window covering `bbox` inside a raster with the given bounds and
/// `(height, width)` shape.
///
/// Both the box and the raster bounds must be in the same CRS. Pixel
/// coordinates are sampled evenly from edge to edge, rows counting down from
/// the top. Parts of the box outside the raster are clipped.
pub fn bbox_to_window(bbox: &BoundingBox, bounds: &Extent, shape: (usize, usize)) -> Window {
    let (height, width) = shape;

    let row_of = |y: f64| height - search_sorted(bounds.bottom, bounds.top, height, y);
    let col_of = |x: f64| search_sorted(bounds.left, bounds.right, width, x);

    Window {
        row_start: row_of(bbox.north),
        row_stop: row_of(bbox.south),
        col_start: col_of(bbox.west),
        col_stop: col_of(bbox.east),
    }
}

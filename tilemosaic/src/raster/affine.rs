//! Pixel to world affine transform.

use crate::coord::Extent;

/// Maps pixel `(col, row)` to world `(x, y)`:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel `(0, 0)` is the outer corner of the top-left pixel, so pixel
/// centres sit at half-integer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// North-up transform from the top-left corner and pixel sizes.
    pub fn from_origin(west: f64, north: f64, xres: f64, yres: f64) -> Self {
        Self::new(xres, 0.0, west, 0.0, -yres, north)
    }

    /// North-up transform that stretches a `width x height` grid over an extent.
    pub fn from_extent(extent: &Extent, width: usize, height: usize) -> Self {
        Self::from_origin(
            extent.left,
            extent.top,
            extent.width() / width as f64,
            extent.height() / height as f64,
        )
    }

    /// World coordinates of a pixel position.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Inverse transform (world to pixel), `None` when degenerate.
    pub fn inverse(&self) -> Option<AffineTransform> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Some(Self::new(
            a,
            b,
            -(a * self.c + b * self.f),
            d,
            e,
            -(d * self.c + e * self.f),
        ))
    }

    /// Transform for a grid resampled by `sx` columns and `sy` rows per
    /// original pixel.
    pub fn scale(&self, sx: f64, sy: f64) -> AffineTransform {
        Self::new(
            self.a * sx,
            self.b * sy,
            self.c,
            self.d * sx,
            self.e * sy,
            self.f,
        )
    }

    /// Transform of a sub-window starting at `(col_off, row_off)`.
    pub fn translate_pixels(&self, col_off: f64, row_off: f64) -> AffineTransform {
        let (c, f) = self.apply(col_off, row_off);
        Self { c, f, ..*self }
    }

    /// Extent covered by a `width x height` grid.
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(width as f64, 0.0),
            self.apply(0.0, height as f64),
            self.apply(width as f64, height as f64),
        ];
        let xs = corners.iter().map(|p| p.0);
        let ys = corners.iter().map(|p| p.1);
        Extent {
            left: xs.clone().fold(f64::INFINITY, f64::min),
            right: xs.fold(f64::NEG_INFINITY, f64::max),
            bottom: ys.clone().fold(f64::INFINITY, f64::min),
            top: ys.fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Pixel sizes `(x, y)` of a rotation-free transform.
    pub fn resolution(&self) -> (f64, f64) {
        (self.a.hypot(self.d), self.b.hypot(self.e))
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_from_origin() {
        let t = AffineTransform::from_origin(100.0, 500.0, 10.0, 20.0);
        assert_close(t.apply(0.0, 0.0), (100.0, 500.0));
        assert_close(t.apply(2.0, 3.0), (120.0, 440.0));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = AffineTransform::new(2.0, 0.5, 10.0, -0.25, -3.0, 7.0);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(4.5, 9.25);
        assert_close(inv.apply(x, y), (4.5, 9.25));
    }

    #[test]
    fn test_degenerate_has_no_inverse() {
        let t = AffineTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_extent_and_resolution() {
        let t = AffineTransform::from_origin(-10.0, 10.0, 0.5, 0.25);
        let extent = t.extent(40, 80);
        assert_eq!(
            extent,
            Extent {
                left: -10.0,
                right: 10.0,
                bottom: -10.0,
                top: 10.0
            }
        );
        assert_eq!(t.resolution(), (0.5, 0.25));
        assert_eq!(AffineTransform::from_extent(&extent, 40, 80), t);
    }

    #[test]
    fn test_translate_pixels() {
        let t = AffineTransform::from_origin(0.0, 100.0, 1.0, 1.0);
        let sub = t.translate_pixels(10.0, 5.0);
        assert_close(sub.apply(0.0, 0.0), (10.0, 95.0));
    }

    #[test]
    fn test_scale() {
        let t = AffineTransform::from_origin(0.0, 100.0, 2.0, 2.0).scale(0.5, 0.5);
        assert_close(t.apply(4.0, 4.0), (4.0, 96.0));
    }
}

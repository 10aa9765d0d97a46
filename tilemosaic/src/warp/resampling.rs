//! Resampling kernels for the warper.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use super::WarpError;

/// Interpolation used when sampling the source raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
    /// Catmull-Rom cubic convolution
    Cubic,
    /// Windowed sinc with a 3 pixel radius
    Lanczos,
}

const LANCZOS_RADIUS: i64 = 3;

impl Resampling {
    /// Samples one band at pixel position `(x, y)`.
    ///
    /// Positions use the affine convention: `(0, 0)` is the outer corner of
    /// the first pixel. Returns `None` outside the raster.
    pub(crate) fn sample(&self, plane: &[u8], width: usize, height: usize, x: f64, y: f64) -> Option<u8> {
        let inside = x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64;
        if !inside {
            return None;
        }
        let value = match self {
            Resampling::Nearest => {
                return Some(plane[y as usize * width + x as usize]);
            }
            Resampling::Bilinear => {
                let grid = Grid::new(plane, width, height);
                let (fx, fy) = (x - 0.5, y - 0.5);
                let (x0, y0) = (fx.floor(), fy.floor());
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = grid.at(x0, y0) * (1.0 - tx) + grid.at(x0 + 1, y0) * tx;
                let bottom = grid.at(x0, y0 + 1) * (1.0 - tx) + grid.at(x0 + 1, y0 + 1) * tx;
                top * (1.0 - ty) + bottom * ty
            }
            Resampling::Cubic => Grid::new(plane, width, height).convolve(x, y, 2, catmull_rom),
            Resampling::Lanczos => {
                Grid::new(plane, width, height).convolve(x, y, LANCZOS_RADIUS, lanczos)
            }
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    }
}

/// Edge-clamped view of one band.
struct Grid<'a> {
    plane: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> Grid<'a> {
    fn new(plane: &'a [u8], width: usize, height: usize) -> Self {
        Self {
            plane,
            width,
            height,
        }
    }

    #[inline]
    fn at(&self, col: i64, row: i64) -> f64 {
        let col = col.clamp(0, self.width as i64 - 1) as usize;
        let row = row.clamp(0, self.height as i64 - 1) as usize;
        self.plane[row * self.width + col] as f64
    }

    /// Separable convolution over a `2 * radius` square of neighbours.
    fn convolve(&self, x: f64, y: f64, radius: i64, kernel: fn(f64) -> f64) -> f64 {
        let (fx, fy) = (x - 0.5, y - 0.5);
        let (x0, y0) = (fx.floor() as i64, fy.floor() as i64);

        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for j in (y0 - radius + 1)..=(y0 + radius) {
            let wy = kernel(fy - j as f64);
            for i in (x0 - radius + 1)..=(x0 + radius) {
                let w = kernel(fx - i as f64) * wy;
                sum += w * self.at(i, j);
                weight_sum += w;
            }
        }
        if weight_sum == 0.0 {
            self.at(x0, y0)
        } else {
            sum / weight_sum
        }
    }
}

fn catmull_rom(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t.powi(3) - (A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        A * t.powi(3) - 5.0 * A * t.powi(2) + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

fn lanczos(t: f64) -> f64 {
    let radius = LANCZOS_RADIUS as f64;
    if t == 0.0 {
        return 1.0;
    }
    if t.abs() >= radius {
        return 0.0;
    }
    let pt = PI * t;
    radius * pt.sin() * (pt / radius).sin() / (pt * pt)
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::Lanczos => "lanczos",
        };
        f.write_str(name)
    }
}

impl FromStr for Resampling {
    type Err = WarpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Resampling::Nearest),
            "bilinear" => Ok(Resampling::Bilinear),
            "cubic" => Ok(Resampling::Cubic),
            "lanczos" => Ok(Resampling::Lanczos),
            _ => Err(WarpError::UnsupportedResampling(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x2 plane: left half 0, right half 200
    const PLANE: [u8; 8] = [0, 0, 200, 200, 0, 0, 200, 200];

    #[test]
    fn test_parse_names() {
        assert_eq!("nearest".parse::<Resampling>().unwrap(), Resampling::Nearest);
        assert_eq!("Bilinear".parse::<Resampling>().unwrap(), Resampling::Bilinear);
        assert_eq!("cubic".parse::<Resampling>().unwrap(), Resampling::Cubic);
        assert_eq!("lanczos".parse::<Resampling>().unwrap(), Resampling::Lanczos);
        for name in ["average", "mode", "gauss", "cubic_spline", "max"] {
            assert!(matches!(
                name.parse::<Resampling>(),
                Err(WarpError::UnsupportedResampling(ref n)) if n == name
            ));
        }
        assert_eq!(Resampling::default(), Resampling::Bilinear);
    }

    #[test]
    fn test_outside_is_none() {
        for kernel in [Resampling::Nearest, Resampling::Bilinear, Resampling::Cubic] {
            assert_eq!(kernel.sample(&PLANE, 4, 2, -0.1, 1.0), None);
            assert_eq!(kernel.sample(&PLANE, 4, 2, 4.0, 1.0), None);
            assert_eq!(kernel.sample(&PLANE, 4, 2, 1.0, f64::NAN), None);
        }
    }

    #[test]
    fn test_pixel_centres_are_exact() {
        for kernel in [
            Resampling::Nearest,
            Resampling::Bilinear,
            Resampling::Cubic,
            Resampling::Lanczos,
        ] {
            assert_eq!(kernel.sample(&PLANE, 4, 2, 0.5, 0.5), Some(0), "{kernel}");
            assert_eq!(kernel.sample(&PLANE, 4, 2, 3.5, 1.5), Some(200), "{kernel}");
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        // Halfway between column 1 (0) and column 2 (200)
        assert_eq!(Resampling::Bilinear.sample(&PLANE, 4, 2, 2.0, 1.0), Some(100));
        assert_eq!(Resampling::Nearest.sample(&PLANE, 4, 2, 1.99, 1.0), Some(0));
    }

    #[test]
    fn test_kernels() {
        assert_eq!(catmull_rom(0.0), 1.0);
        assert_eq!(catmull_rom(1.0), 0.0);
        assert_eq!(catmull_rom(2.5), 0.0);
        assert_eq!(lanczos(0.0), 1.0);
        assert!(lanczos(1.0).abs() < 1e-12);
        assert_eq!(lanczos(3.0), 0.0);
    }
}

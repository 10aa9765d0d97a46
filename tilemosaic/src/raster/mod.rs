//! In-memory rasters and georeferencing.
//!
//! Two layouts are used. [`PixelArray`] is pixel-interleaved
//! (`height x width x bands`), the natural layout of decoded tiles and of the
//! returned mosaic. [`BandArray`] is band-sequential (`bands x height x
//! width`), the layout the warper samples from.

mod affine;
mod geotiff;

pub use affine::AffineTransform;
pub use geotiff::{read_geotiff, write_geotiff, GeoRaster};

use image::RgbaImage;
use thiserror::Error;

use crate::coord::Window;

/// Errors from raster construction and GeoTIFF I/O.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("buffer of {actual} bytes does not match a {height}x{width}x{bands} raster")]
    ShapeMismatch {
        height: usize,
        width: usize,
        bands: usize,
        actual: usize,
    },

    #[error("raster has zero width, height or bands")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    #[error("raster has no usable georeferencing: {0}")]
    MissingGeoreference(String),
}

/// Pixel-interleaved 8-bit raster, `height x width x bands`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray {
    height: usize,
    width: usize,
    bands: usize,
    data: Vec<u8>,
}

impl PixelArray {
    /// Zero-filled raster.
    pub fn zeros(height: usize, width: usize, bands: usize) -> Self {
        Self {
            height,
            width,
            bands,
            data: vec![0; height * width * bands],
        }
    }

    /// Wraps an interleaved buffer.
    pub fn from_vec(
        height: usize,
        width: usize,
        bands: usize,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        if data.len() != height * width * bands {
            return Err(RasterError::ShapeMismatch {
                height,
                width,
                bands,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            bands,
            data,
        })
    }

    /// Copies an RGBA image into a 4-band array.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        Self {
            height: image.height() as usize,
            width: image.width() as usize,
            bands: 4,
            data: image.as_raw().clone(),
        }
    }

    /// Converts a 4-band array back to an RGBA image.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if self.bands != 4 {
            return None;
        }
        RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// `(height, width, bands)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.bands)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// All band values of one pixel.
    pub fn pixel(&self, row: usize, col: usize) -> &[u8] {
        let start = (row * self.width + col) * self.bands;
        &self.data[start..start + self.bands]
    }

    /// Mutable interleaved slice of one row.
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let stride = self.width * self.bands;
        &mut self.data[row * stride..(row + 1) * stride]
    }

    /// Copies a window of the raster; the window is clipped to the raster.
    pub fn crop(&self, window: &Window) -> PixelArray {
        let row_start = window.row_start.min(self.height);
        let row_stop = window.row_stop.clamp(row_start, self.height);
        let col_start = window.col_start.min(self.width);
        let col_stop = window.col_stop.clamp(col_start, self.width);

        let mut out = PixelArray::zeros(row_stop - row_start, col_stop - col_start, self.bands);
        for (out_row, row) in (row_start..row_stop).enumerate() {
            let src = (row * self.width + col_start) * self.bands;
            let len = (col_stop - col_start) * self.bands;
            out.row_mut(out_row)
                .copy_from_slice(&self.data[src..src + len]);
        }
        out
    }

    /// Band-sequential copy.
    pub fn to_bands(&self) -> BandArray {
        let plane = self.height * self.width;
        let mut data = vec![0u8; plane * self.bands];
        for (i, pixel) in self.data.chunks_exact(self.bands.max(1)).enumerate() {
            for (band, value) in pixel.iter().enumerate() {
                data[band * plane + i] = *value;
            }
        }
        BandArray {
            bands: self.bands,
            height: self.height,
            width: self.width,
            data,
        }
    }
}

/// Band-sequential 8-bit raster, `bands x height x width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandArray {
    bands: usize,
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl BandArray {
    pub fn zeros(bands: usize, height: usize, width: usize) -> Self {
        Self {
            bands,
            height,
            width,
            data: vec![0; bands * height * width],
        }
    }

    pub fn from_vec(
        bands: usize,
        height: usize,
        width: usize,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        if data.len() != bands * height * width {
            return Err(RasterError::ShapeMismatch {
                height,
                width,
                bands,
                actual: data.len(),
            });
        }
        Ok(Self {
            bands,
            height,
            width,
            data,
        })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `(bands, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bands, self.height, self.width)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// One band as a row-major `height x width` plane.
    pub fn band(&self, band: usize) -> &[u8] {
        let plane = self.height * self.width;
        &self.data[band * plane..(band + 1) * plane]
    }

    /// Value at a band, row and column.
    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> u8 {
        self.data[(band * self.height + row) * self.width + col]
    }

    /// Pixel-interleaved copy.
    pub fn to_pixels(&self) -> PixelArray {
        let plane = self.height * self.width;
        let mut data = vec![0u8; plane * self.bands];
        for band in 0..self.bands {
            for (i, value) in self.band(band).iter().enumerate() {
                data[i * self.bands + band] = *value;
            }
        }
        PixelArray {
            height: self.height,
            width: self.width,
            bands: self.bands,
            data,
        }
    }
}

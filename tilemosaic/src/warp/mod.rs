//! Raster reprojection
//!
//! [`warp`] resamples a georeferenced raster into another CRS. The output
//! grid is north-up with square pixels and covers the projected footprint of
//! the source. Every output pixel centre is projected back into the source
//! and sampled; pixels that fall outside the source are left at zero.

mod crs;
mod resampling;

pub use crs::{transformer, Crs, CrsTransformer, TransformerCache};
pub use resampling::Resampling;

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::coord::Extent;
use crate::raster::{AffineTransform, BandArray, PixelArray};

/// Footprint sampling density along each source axis.
const FOOTPRINT_SAMPLES: usize = 21;

/// Errors from reprojection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarpError {
    #[error("unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("resampling method '{0}' is not supported (use nearest, bilinear, cubic or lanczos)")]
    UnsupportedResampling(String),

    #[error("cannot warp from {source_crs} to {target_crs}: {reason}")]
    TransformFailed {
        source_crs: String,
        target_crs: String,
        reason: String,
    },

    #[error("raster to warp from {source_crs} to {target_crs} is empty")]
    EmptyRaster {
        source_crs: String,
        target_crs: String,
    },
}

impl WarpError {
    fn failed(source: &Crs, target: &Crs, reason: impl Into<String>) -> Self {
        WarpError::TransformFailed {
            source_crs: source.to_string(),
            target_crs: target.to_string(),
            reason: reason.into(),
        }
    }
}

/// A warped raster with its georeferencing in the target CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpedRaster {
    pub data: BandArray,
    pub transform: AffineTransform,
    pub extent: Extent,
}

/// Projects a `FOOTPRINT_SAMPLES` grid over the source into the target CRS
/// and returns the bounds of the finite results.
fn projected_footprint(
    width: usize,
    height: usize,
    transform: &AffineTransform,
    forward: &CrsTransformer,
) -> Option<Extent> {
    let steps = (FOOTPRINT_SAMPLES - 1) as f64;
    let mut bounds: Option<Extent> = None;
    for j in 0..FOOTPRINT_SAMPLES {
        let row = height as f64 * j as f64 / steps;
        for i in 0..FOOTPRINT_SAMPLES {
            let col = width as f64 * i as f64 / steps;
            let (x, y) = transform.apply(col, row);
            let Some((tx, ty)) = forward.transform(x, y) else {
                continue;
            };
            bounds = Some(match bounds {
                None => Extent {
                    left: tx,
                    right: tx,
                    bottom: ty,
                    top: ty,
                },
                Some(b) => Extent {
                    left: b.left.min(tx),
                    right: b.right.max(tx),
                    bottom: b.bottom.min(ty),
                    top: b.top.max(ty),
                },
            });
        }
    }
    bounds
}

/// Reprojects a band-sequential raster from `source` to `target`.
pub fn warp(
    image: &BandArray,
    transform: &AffineTransform,
    source: &Crs,
    target: &Crs,
    resampling: Resampling,
) -> Result<WarpedRaster, WarpError> {
    let (bands, height, width) = image.shape();
    if bands == 0 || height == 0 || width == 0 {
        return Err(WarpError::EmptyRaster {
            source_crs: source.to_string(),
            target_crs: target.to_string(),
        });
    }
    let to_source_pixels = transform
        .inverse()
        .ok_or_else(|| WarpError::failed(source, target, "source transform is not invertible"))?;

    let lookup = |from: &Crs, to: &Crs| {
        transformer(from, to).map_err(|e| match e {
            WarpError::UnknownCrs(name) => WarpError::failed(source, target, format!("unknown CRS {}", name)),
            other => other,
        })
    };
    let forward = lookup(source, target)?;
    let backward = lookup(target, source)?;

    let footprint = projected_footprint(width, height, transform, &forward)
        .ok_or_else(|| WarpError::failed(source, target, "no source point has a finite projection"))?;

    // Square pixels; keep the source pixel count along the diagonal.
    let target_diagonal = footprint.width().hypot(footprint.height());
    let source_diagonal = (width as f64).hypot(height as f64);
    let resolution = target_diagonal / source_diagonal;
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(WarpError::failed(source, target, "footprint has no area"));
    }
    let out_width = ((footprint.width() / resolution).round() as usize).max(1);
    let out_height = ((footprint.height() / resolution).round() as usize).max(1);
    let out_transform = AffineTransform::from_origin(footprint.left, footprint.top, resolution, resolution);

    debug!(
        source = %source,
        target = %target,
        width = out_width,
        height = out_height,
        resolution = resolution,
        resampling = %resampling,
        "Warping raster"
    );

    let mut pixels = vec![0u8; out_width * out_height * bands];
    pixels
        .par_chunks_mut(out_width * bands)
        .enumerate()
        .for_each(|(row, line)| {
            for col in 0..out_width {
                let (x, y) = out_transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                let Some((sx, sy)) = backward.transform(x, y) else {
                    continue;
                };
                let (src_col, src_row) = to_source_pixels.apply(sx, sy);
                for band in 0..bands {
                    if let Some(value) =
                        resampling.sample(image.band(band), width, height, src_col, src_row)
                    {
                        line[col * bands + band] = value;
                    }
                }
            }
        });

    let data = match PixelArray::from_vec(out_height, out_width, bands, pixels) {
        Ok(interleaved) => interleaved.to_bands(),
        Err(e) => return Err(WarpError::failed(source, target, e.to_string())),
    };

    Ok(WarpedRaster {
        data,
        extent: out_transform.extent(out_width, out_height),
        transform: out_transform,
    })
}

/// Reprojects a web mercator mosaic into `target`.
///
/// Takes and returns the mosaic convention: a `height x width x bands` image
/// with its `(left, right, bottom, top)` extent.
pub fn warp_tiles(
    image: &PixelArray,
    extent: Extent,
    target: &Crs,
    resampling: Resampling,
) -> Result<(PixelArray, Extent), WarpError> {
    let transform = AffineTransform::from_extent(&extent, image.width(), image.height());
    let warped = warp(&image.to_bands(), &transform, &Crs::WEB_MERCATOR, target, resampling)?;
    Ok((warped.data.to_pixels(), warped.extent))
}

/// Reprojects a band-sequential raster, returning it with its new transform.
pub fn warp_img_transform(
    image: &BandArray,
    transform: &AffineTransform,
    source: &Crs,
    target: &Crs,
    resampling: Resampling,
) -> Result<(BandArray, AffineTransform), WarpError> {
    let warped = warp(image, transform, source, target, resampling)?;
    Ok((warped.data, warped.transform))
}

//! Crate-level error type.

use thiserror::Error;

use crate::coord::CoordError;
use crate::dispatch::DispatchError;
use crate::fetch::FetchError;
use crate::mosaic::MosaicError;
use crate::provider::ProviderError;
use crate::raster::RasterError;
use crate::warp::WarpError;
use crate::zoom::ZoomError;

/// Errors returned by the pipeline operations.
#[derive(Debug, Error)]
pub enum TileMosaicError {
    #[error("invalid coordinates: {0}")]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Zoom(#[from] ZoomError),

    #[error("tile source error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("mosaic error: {0}")]
    Mosaic(#[from] MosaicError),

    #[error("raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("reprojection error: {0}")]
    Warp(#[from] WarpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TileMosaicError {
    /// The underlying fetch error, whether raised directly or by the dispatcher.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            TileMosaicError::Fetch(e) | TileMosaicError::Dispatch(DispatchError::Fetch(e)) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, TileMosaicError>;

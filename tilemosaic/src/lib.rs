//! tilemosaic - Web map tiles to georeferenced basemaps
//!
//! This library fetches raster tiles from XYZ tile services (or reads a local
//! GeoTIFF), caches them on disk, merges them into one image covering a
//! bounding box and optionally reprojects the result into another CRS.
//!
//! # High-Level API
//!
//! The [`pipeline`] module provides the entry points:
//!
//! ```ignore
//! use tilemosaic::{BoundingBox, MosaicRequest, PipelineConfig, TilePipeline, ZoomSpec};
//!
//! let pipeline = TilePipeline::new(PipelineConfig::default())?;
//! let bbox = BoundingBox::geographic(-106.65, 25.85, -93.51, 36.49)?;
//! let request = MosaicRequest::new(bbox).with_zoom(ZoomSpec::Level(6));
//!
//! let mosaic = pipeline.bounds_to_img(&request).await?;
//! let (image, extent) = tilemosaic::warp::warp_tiles(
//!     &mosaic.image,
//!     mosaic.extent,
//!     &"EPSG:4326".parse()?,
//!     Default::default(),
//! )?;
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod mosaic;
pub mod pipeline;
pub mod provider;
pub mod raster;
pub mod warp;
pub mod zoom;

pub use config::PipelineConfig;
pub use coord::{BoundingBox, CoordSystem, Extent, Tile};
pub use error::{Result, TileMosaicError};
pub use mosaic::Mosaic;
pub use pipeline::{howmany, MosaicRequest, TilePipeline};
pub use provider::{TileProvider, TileSource};
pub use warp::{warp_img_transform, warp_tiles, Crs, Resampling};
pub use zoom::ZoomSpec;

/// Version of the tilemosaic library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

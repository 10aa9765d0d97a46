//! Zoom level selection and validation.
//!
//! A zoom is either requested explicitly or inferred from the size of the
//! bounding box. Either way it is checked against the provider's zoom range
//! before any tile is requested.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::coord::BoundingBox;
use crate::provider::TileProvider;

/// Upper bound assumed when a provider does not advertise `max_zoom`.
pub const FALLBACK_MAX_ZOOM: u8 = 30;

/// How the zoom level for a request is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomSpec {
    /// Infer from the bounding box size
    #[default]
    Auto,
    /// Use this level as-is
    Level(u8),
}

/// Whether a zoom was inferred or given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomMode {
    Inferred,
    Specified,
}

impl fmt::Display for ZoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomMode::Inferred => write!(f, "inferred"),
            ZoomMode::Specified => write!(f, "specified"),
        }
    }
}

/// Errors from zoom validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoomError {
    #[error("{}", out_of_range_message(.zoom, .mode, .min, .max))]
    OutOfRange {
        zoom: i32,
        mode: ZoomMode,
        min: u8,
        /// `None` when the provider does not advertise a maximum
        max: Option<u8>,
    },
}

fn out_of_range_message(zoom: &i32, mode: &ZoomMode, min: &u8, max: &Option<u8>) -> String {
    let mut msg = format!(
        "The {} zoom level of {} is not valid for the current tile provider",
        mode, zoom
    );
    match max {
        Some(max) => msg.push_str(&format!(" (valid zooms: {} - {}).", min, max)),
        None => msg.push('.'),
    }
    if *mode == ZoomMode::Inferred {
        msg.push_str(
            " This can indicate that the extent of your figure is wrong (e.g. too \
             small extent, or in the wrong coordinate reference system)",
        );
    }
    msg
}

/// A zoom level that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedZoom {
    pub zoom: u8,
    /// Original inferred zoom when it was clamped down to the provider maximum
    pub clamped_from: Option<i32>,
}

fn zoom_for_span(span: f64) -> i32 {
    if span.is_nan() || span <= 0.0 || span.is_infinite() {
        return i32::MAX;
    }
    let z = (720.0 / span).log2().ceil();
    if z >= i32::MAX as f64 {
        i32::MAX
    } else if z <= i32::MIN as f64 {
        i32::MIN
    } else {
        z as i32
    }
}

/// Infers a zoom level from the size of a bounding box.
///
/// Each axis gives `ceil(log2(720 / span_degrees))`; the smaller of the two
/// is used so that the longer axis is not over-fetched. An axis with zero
/// span defers to the other one, and a box that is a single point yields
/// `i32::MAX`, which validation later clamps or rejects.
pub fn auto_zoom(bbox: &BoundingBox) -> i32 {
    let geographic = bbox.to_geographic();
    let lon_zoom = zoom_for_span(geographic.width().abs());
    let lat_zoom = zoom_for_span(geographic.height().abs());
    lon_zoom.min(lat_zoom)
}

/// Checks a zoom against the provider's advertised range.
///
/// Inferred zooms above a known maximum are clamped with a warning; every
/// other out-of-range zoom is an error.
pub fn validate_zoom(
    zoom: i32,
    provider: &TileProvider,
    auto: bool,
) -> Result<ValidatedZoom, ZoomError> {
    let min = provider.min_zoom.unwrap_or(0);
    let max = provider.max_zoom;
    let upper = max.unwrap_or(FALLBACK_MAX_ZOOM);

    if (i32::from(min)..=i32::from(upper)).contains(&zoom) {
        return Ok(ValidatedZoom {
            zoom: zoom as u8,
            clamped_from: None,
        });
    }

    let mode = if auto {
        ZoomMode::Inferred
    } else {
        ZoomMode::Specified
    };

    if let (true, Some(max)) = (auto, max) {
        if zoom > i32::from(max) {
            warn!(
                zoom = zoom,
                max_zoom = max,
                provider = %provider.name,
                "The inferred zoom level of {} is not valid for the current tile provider \
                 (valid zooms: {} - {}); using {}",
                zoom,
                min,
                max,
                max
            );
            return Ok(ValidatedZoom {
                zoom: max,
                clamped_from: Some(zoom),
            });
        }
    }

    Err(ZoomError::OutOfRange {
        zoom,
        mode,
        min,
        max,
    })
}

/// Resolves a [`ZoomSpec`] for a bounding box and provider.
///
/// `zoom_adjust` shifts an inferred zoom before validation and is ignored for
/// explicit levels.
pub fn resolve_zoom(
    spec: ZoomSpec,
    zoom_adjust: Option<i32>,
    bbox: &BoundingBox,
    provider: &TileProvider,
) -> Result<ValidatedZoom, ZoomError> {
    match spec {
        ZoomSpec::Auto => {
            let zoom = auto_zoom(bbox).saturating_add(zoom_adjust.unwrap_or(0));
            validate_zoom(zoom, provider, true)
        }
        ZoomSpec::Level(level) => validate_zoom(i32::from(level), provider, false),
    }
}

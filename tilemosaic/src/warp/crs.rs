//! Coordinate reference systems and cached point transformers.
//!
//! EPSG codes are resolved to proj4 strings through `crs-definitions` and
//! transformed with `proj4rs`. proj4rs works in radians for geographic
//! systems, so degrees are converted at the boundary.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use proj4rs::proj::Proj;
use tracing::debug;

use super::WarpError;

/// A coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// An EPSG code, e.g. `EPSG:3857`
    Epsg(u16),
    /// A raw proj4 definition, e.g. `+proj=longlat +datum=WGS84`
    Proj4(String),
}

impl Crs {
    /// Spherical mercator, the CRS of web tiles.
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);
    /// WGS84 longitude/latitude.
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// The proj4 definition, `None` for an EPSG code missing from the database.
    pub fn proj_string(&self) -> Option<&str> {
        match self {
            Crs::Epsg(code) => crs_definitions::from_code(*code).map(|def| def.proj4),
            Crs::Proj4(definition) => Some(definition.as_str()),
        }
    }

    /// True for longitude/latitude systems.
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Some(definition) => {
                definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
            }
            None => matches!(self, Crs::Epsg(4326)),
        }
    }

    /// The EPSG code, if this CRS is identified by one.
    pub fn epsg(&self) -> Option<u16> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj4(_) => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj4(definition) => write!(f, "{}", definition),
        }
    }
}

impl FromStr for Crs {
    type Err = WarpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with("+proj=") {
            return Ok(Crs::Proj4(trimmed.to_string()));
        }
        let code = trimmed
            .split_once(':')
            .filter(|(authority, _)| authority.eq_ignore_ascii_case("epsg"))
            .and_then(|(_, code)| code.trim().parse::<u16>().ok())
            .ok_or_else(|| WarpError::UnknownCrs(s.to_string()))?;
        let crs = Crs::Epsg(code);
        if crs.proj_string().is_none() {
            return Err(WarpError::UnknownCrs(s.to_string()));
        }
        Ok(crs)
    }
}

impl From<u16> for Crs {
    fn from(code: u16) -> Self {
        Crs::Epsg(code)
    }
}

/// Transforms points from one CRS to another.
pub struct CrsTransformer {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
    identity: bool,
}

impl CrsTransformer {
    /// Builds a transformer, failing when either CRS cannot be parsed.
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, WarpError> {
        let build = |crs: &Crs| -> Result<Proj, WarpError> {
            let definition = crs
                .proj_string()
                .ok_or_else(|| WarpError::UnknownCrs(crs.to_string()))?;
            Proj::from_proj_string(definition).map_err(|e| WarpError::TransformFailed {
                source_crs: source.to_string(),
                target_crs: target.to_string(),
                reason: format!("invalid projection {}: {:?}", crs, e),
            })
        };
        Ok(Self {
            source: build(source)?,
            target: build(target)?,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
            identity: source == target,
        })
    }

    /// Transforms one point, `None` when it has no finite image.
    pub fn transform(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.identity {
            return Some((x, y));
        }
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.source, &self.target, &mut point).ok()?;

        let (out_x, out_y) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        (out_x.is_finite() && out_y.is_finite()).then_some((out_x, out_y))
    }
}

type TransformerKey = (Crs, Crs);

/// Transformers keyed by `(source, target)`, built once per pair.
#[derive(Default)]
pub struct TransformerCache {
    cache: RwLock<HashMap<TransformerKey, Arc<CrsTransformer>>>,
}

impl TransformerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached transformer for a pair, building it on first use.
    pub fn get(&self, source: &Crs, target: &Crs) -> Result<Arc<CrsTransformer>, WarpError> {
        let key = (source.clone(), target.clone());
        if let Some(transformer) = self.cache.read().get(&key) {
            return Ok(Arc::clone(transformer));
        }

        let transformer = Arc::new(CrsTransformer::new(source, target)?);
        debug!(source = %source, target = %target, "Built CRS transformer");

        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(key).or_insert(transformer)))
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

/// Process-wide transformer cache.
pub fn transformer(source: &Crs, target: &Crs) -> Result<Arc<CrsTransformer>, WarpError> {
    static CACHE: OnceLock<TransformerCache> = OnceLock::new();
    CACHE.get_or_init(TransformerCache::new).get(source, target)
}

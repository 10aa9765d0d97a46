//! Tile source resolution

use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use super::template::rewrite_legacy;
use super::types::{ProviderError, TileProvider};

/// Where tiles for a request come from.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSource {
    /// A provider record
    Web(TileProvider),
    /// A bare XYZ URL template
    RawUrl(String),
    /// A local georeferenced raster (GeoTIFF)
    LocalFile(PathBuf),
}

impl TileSource {
    /// Interprets a JSON value as a tile source.
    ///
    /// Strings are URL templates and objects are provider records; any other
    /// JSON type is rejected.
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        match value {
            Value::String(url) => Ok(TileSource::RawUrl(url.clone())),
            Value::Object(_) => TileProvider::from_record(value).map(TileSource::Web),
            Value::Null => Err(ProviderError::UnsupportedSource("null".to_string())),
            Value::Bool(_) => Err(ProviderError::UnsupportedSource("a boolean".to_string())),
            Value::Number(_) => Err(ProviderError::UnsupportedSource("a number".to_string())),
            Value::Array(_) => Err(ProviderError::UnsupportedSource("an array".to_string())),
        }
    }
}

impl From<TileProvider> for TileSource {
    fn from(provider: TileProvider) -> Self {
        TileSource::Web(provider)
    }
}

/// A source after defaults and legacy templates have been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSource {
    Web(TileProvider),
    Local(PathBuf),
}

/// Resolves an optional source against the default provider.
///
/// Raw URLs become providers named `"url"` with an empty attribution.
pub fn resolve_source(
    source: Option<TileSource>,
    default: &TileProvider,
) -> Result<ResolvedSource, ProviderError> {
    let provider = match source {
        None => default.clone(),
        Some(TileSource::Web(provider)) => provider,
        Some(TileSource::RawUrl(url)) => TileProvider::new("url", url),
        Some(TileSource::LocalFile(path)) => return Ok(ResolvedSource::Local(path)),
    };
    Ok(ResolvedSource::Web(upgrade_legacy(provider)))
}

fn upgrade_legacy(mut provider: TileProvider) -> TileProvider {
    if let Some(url) = rewrite_legacy(&provider.url) {
        warn!(
            provider = %provider.name,
            url = %provider.url,
            "The url format using 'tileX', 'tileY', 'tileZ' as placeholders is deprecated; \
             use '{{x}}', '{{y}}', '{{z}}' instead"
        );
        provider.url = url;
    }
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Tile;
    use serde_json::json;

    #[test]
    fn test_none_resolves_to_default() {
        let default = TileProvider::openstreetmap_hot();
        let resolved = resolve_source(None, &default).unwrap();
        assert_eq!(resolved, ResolvedSource::Web(default));
    }

    #[test]
    fn test_raw_url_becomes_named_url() {
        let default = TileProvider::openstreetmap_hot();
        let source = TileSource::RawUrl("https://t.example/{z}/{x}/{y}.png".into());
        let ResolvedSource::Web(p) = resolve_source(Some(source), &default).unwrap() else {
            panic!("expected a web provider");
        };
        assert_eq!(p.name, "url");
        assert_eq!(p.attribution, "");
        assert_eq!(p.max_zoom, None);
    }

    #[test]
    fn test_legacy_placeholders_rewritten() {
        let default = TileProvider::openstreetmap_hot();
        let source = TileSource::RawUrl("http://tile.stamen.com/terrain/tileZ/tileX/tileY.png".into());
        let ResolvedSource::Web(p) = resolve_source(Some(source), &default).unwrap() else {
            panic!("expected a web provider");
        };
        assert_eq!(
            p.build_url(&Tile { x: 1, y: 2, z: 3 }).unwrap(),
            "http://tile.stamen.com/terrain/3/1/2.png"
        );
    }

    #[test]
    fn test_local_file_passes_through() {
        let default = TileProvider::openstreetmap_hot();
        let source = TileSource::LocalFile(PathBuf::from("/data/basemap.tif"));
        assert_eq!(
            resolve_source(Some(source), &default).unwrap(),
            ResolvedSource::Local(PathBuf::from("/data/basemap.tif"))
        );
    }

    #[test]
    fn test_from_json_variants() {
        assert_eq!(
            TileSource::from_json(&json!("https://x/{z}/{x}/{y}")).unwrap(),
            TileSource::RawUrl("https://x/{z}/{x}/{y}".into())
        );
        assert!(matches!(
            TileSource::from_json(&json!({"url": "https://x/{z}/{x}/{y}", "name": "X"})),
            Ok(TileSource::Web(_))
        ));
        assert_eq!(
            TileSource::from_json(&json!({"name": "X"})),
            Err(ProviderError::MissingUrl)
        );
        assert!(matches!(
            TileSource::from_json(&json!(42)),
            Err(ProviderError::UnsupportedSource(_))
        ));
        assert!(matches!(
            TileSource::from_json(&json!(["a"])),
            Err(ProviderError::UnsupportedSource(_))
        ));
    }
}

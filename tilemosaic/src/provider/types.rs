//! Provider record and error types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coord::Tile;

/// Errors that can occur while resolving a tile source or talking to it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP transport failed (connection, timeout, body read)
    HttpError(String),
    /// Provider record has no `url` key
    MissingUrl,
    /// Source value is neither a URL string nor a provider record
    UnsupportedSource(String),
    /// Provider record could not be parsed
    InvalidRecord(String),
    /// URL template names a key the provider record does not define
    UnknownPlaceholder { placeholder: String, url: String },
    /// Provider record still carries an `<insert your ...>` value
    MissingToken { provider: String, key: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::MissingUrl => {
                write!(f, "The provider record should at least contain a 'url' key")
            }
            ProviderError::UnsupportedSource(kind) => write!(
                f,
                "The source needs to be a URL string or a provider record, got {}",
                kind
            ),
            ProviderError::InvalidRecord(msg) => write!(f, "Invalid provider record: {}", msg),
            ProviderError::UnknownPlaceholder { placeholder, url } => write!(
                f,
                "URL template '{}' uses unknown placeholder '{{{}}}'",
                url, placeholder
            ),
            ProviderError::MissingToken { provider, key } => write!(
                f,
                "Provider '{}' requires a value for '{}'; set it with with_option before use",
                provider, key
            ),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Subdomain list for the `{s}` placeholder.
///
/// Records carry either a string of single-letter subdomains (`"abc"`) or a
/// list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subdomains {
    Letters(String),
    Names(Vec<String>),
}

impl Subdomains {
    /// The subdomain substituted for `{s}`.
    pub fn first(&self) -> Option<String> {
        match self {
            Subdomains::Letters(s) => s.chars().next().map(String::from),
            Subdomains::Names(names) => names.first().cloned(),
        }
    }
}

impl Default for Subdomains {
    fn default() -> Self {
        Subdomains::Letters("abc".to_string())
    }
}

fn default_name() -> String {
    "url".to_string()
}

fn default_tile_size() -> u32 {
    256
}

/// A resolved XYZ tile provider.
///
/// Deserializes from xyzservices-style JSON records. Keys not modelled as
/// fields land in `options` and are available as `{key}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileProvider {
    #[serde(default = "default_name")]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u8>,
    #[serde(default)]
    pub subdomains: Subdomains,
    /// Retina suffix (e.g. `"@2x"`)
    #[serde(default)]
    pub r: String,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

impl TileProvider {
    /// Creates a provider with default subdomains, retina suffix and tile size.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            attribution: String::new(),
            min_zoom: None,
            max_zoom: None,
            subdomains: Subdomains::default(),
            r: String::new(),
            tile_size: default_tile_size(),
            options: BTreeMap::new(),
        }
    }

    /// Humanitarian OpenStreetMap style, the default basemap.
    pub fn openstreetmap_hot() -> Self {
        Self::new(
            "OpenStreetMap.HOT",
            "https://{s}.tile.openstreetmap.fr/hot/{z}/{x}/{y}.png",
        )
        .with_attribution(
            "(C) OpenStreetMap contributors, Tiles style by Humanitarian OpenStreetMap Team \
             hosted by OpenStreetMap France",
        )
        .with_max_zoom(19)
    }

    /// Parses an xyzservices-style JSON record.
    pub fn from_record(record: &Value) -> Result<Self, ProviderError> {
        if record.get("url").is_none() {
            return Err(ProviderError::MissingUrl);
        }
        serde_json::from_value(record.clone())
            .map_err(|e| ProviderError::InvalidRecord(e.to_string()))
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn with_min_zoom(mut self, zoom: u8) -> Self {
        self.min_zoom = Some(zoom);
        self
    }

    pub fn with_max_zoom(mut self, zoom: u8) -> Self {
        self.max_zoom = Some(zoom);
        self
    }

    pub fn with_subdomains(mut self, subdomains: Subdomains) -> Self {
        self.subdomains = subdomains;
        self
    }

    pub fn with_retina(mut self, suffix: impl Into<String>) -> Self {
        self.r = suffix.into();
        self
    }

    pub fn with_tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    /// Returns a copy with an extra template key set (API keys, variants).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name of the first option still holding an `<insert your ...>` value.
    pub fn missing_token(&self) -> Option<&str> {
        self.options.iter().find_map(|(key, value)| match value {
            Value::String(s) if s.contains("<insert your") => Some(key.as_str()),
            _ => None,
        })
    }

    /// True when the record needs a user-supplied key before it can be used.
    pub fn requires_token(&self) -> bool {
        self.missing_token().is_some()
    }

    /// Builds the request URL for a tile.
    pub fn build_url(&self, tile: &Tile) -> Result<String, ProviderError> {
        if let Some(key) = self.missing_token() {
            return Err(ProviderError::MissingToken {
                provider: self.name.clone(),
                key: key.to_string(),
            });
        }
        super::template::expand(&self.url, |key| self.lookup(key, tile)).map_err(|placeholder| {
            ProviderError::UnknownPlaceholder {
                placeholder,
                url: self.url.clone(),
            }
        })
    }

    fn lookup(&self, key: &str, tile: &Tile) -> Option<String> {
        match key {
            "x" => Some(tile.x.to_string()),
            "y" => Some(tile.y.to_string()),
            "z" => Some(tile.z.to_string()),
            "s" => self.subdomains.first(),
            "r" => Some(self.r.clone()),
            "name" => Some(self.name.clone()),
            "attribution" => Some(self.attribution.clone()),
            "min_zoom" => self.min_zoom.map(|z| z.to_string()),
            "max_zoom" => self.max_zoom.map(|z| z.to_string()),
            "tile_size" => Some(self.tile_size.to_string()),
            _ => self.options.get(key).map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

impl Default for TileProvider {
    fn default() -> Self {
        Self::openstreetmap_hot()
    }
}

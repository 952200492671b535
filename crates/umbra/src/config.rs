//! Theme engine configuration.
//!
//! A [`ThemeConfig`] describes which themes exist, how the active one is
//! written to the document root, and where the user's choice is persisted.
//! It is fixed for the lifetime of a mounted engine; only the forced theme can
//! change afterwards (see [`ThemeEngine::set_forced_theme`](crate::ThemeEngine::set_forced_theme)).
//!
//! ## Construction
//!
//! Programmatic:
//!
//! ```rust
//! use umbra::{Attribute, ThemeConfig};
//!
//! let config = ThemeConfig::new()
//!     .with_themes(["light", "dark", "sepia"])
//!     .with_attributes([Attribute::Class, Attribute::data("mode")])
//!     .with_storage_key("app-theme");
//!
//! assert_eq!(config.default_theme(), "system");
//! assert_eq!(config.exposed_themes(), ["light", "dark", "sepia", "system"]);
//! ```
//!
//! From YAML (keys follow the camelCase names hosts already use):
//!
//! ```rust
//! let config = umbra::ThemeConfig::from_yaml(r#"
//! themes: [light, dark]
//! enableSystem: false
//! attribute: data-theme
//! value:
//!   light: lit
//!   dark: drk
//! "#).unwrap();
//!
//! assert_eq!(config.default_theme(), "light");
//! assert_eq!(config.dom_value("dark"), Some("drk"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::appearance::SYSTEM_THEME;
use crate::error::ConfigError;

/// Extensions accepted by [`ThemeConfig::from_file`], in lookup order.
pub const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const DATA_PREFIX: &str = "data-";

/// A document-root attribute that carries the active theme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// The root element's class list.
    Class,
    /// A `data-*` attribute. Holds the full attribute name, e.g. `data-mode`.
    Data(String),
}

impl Attribute {
    /// Builds a `data-*` attribute from either its suffix or its full name.
    ///
    /// ```rust
    /// use umbra::Attribute;
    ///
    /// assert_eq!(Attribute::data("mode"), Attribute::data("data-mode"));
    /// assert_eq!(Attribute::data("mode").name(), "data-mode");
    /// ```
    pub fn data(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.starts_with(DATA_PREFIX) {
            Attribute::Data(name.to_string())
        } else {
            Attribute::Data(format!("{}{}", DATA_PREFIX, name))
        }
    }

    /// The attribute name as written to the document.
    pub fn name(&self) -> &str {
        match self {
            Attribute::Class => "class",
            Attribute::Data(name) => name,
        }
    }
}

impl FromStr for Attribute {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "class" {
            return Ok(Attribute::Class);
        }
        match s.strip_prefix(DATA_PREFIX) {
            Some(suffix) if !suffix.is_empty() => Ok(Attribute::Data(s.to_string())),
            _ => Err(ConfigError::InvalidAttribute(s.to_string())),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Attribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Configuration for a [`ThemeEngine`](crate::ThemeEngine) mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ThemeConfig {
    themes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forced_theme: Option<String>,
    enable_system: bool,
    disable_transition_on_change: bool,
    enable_color_scheme: bool,
    storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_theme: Option<String>,
    #[serde(deserialize_with = "one_or_many_attributes")]
    attribute: Vec<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            themes: vec!["light".to_string(), "dark".to_string()],
            forced_theme: None,
            enable_system: true,
            disable_transition_on_change: false,
            enable_color_scheme: true,
            storage_key: "theme".to_string(),
            default_theme: None,
            attribute: vec![Attribute::Class],
            value: None,
            nonce: None,
        }
    }
}

impl ThemeConfig {
    /// Creates a configuration with every option at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parses a configuration from JSON.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads a configuration file, choosing the parser by extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedFormat`] for extensions outside
    /// [`CONFIG_EXTENSIONS`], [`ConfigError::Read`] if the file cannot be read,
    /// or the parse error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let extension = match extension {
            Some(ext) if CONFIG_EXTENSIONS.contains(&ext.as_str()) => ext,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if extension == "json" {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Sets the available theme names. `"system"` is added automatically when
    /// system tracking is enabled and should not be listed here.
    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.themes = themes.into_iter().map(Into::into).collect();
        self
    }

    /// Forces a theme for display regardless of the stored choice.
    pub fn with_forced_theme(mut self, theme: impl Into<String>) -> Self {
        self.forced_theme = Some(theme.into());
        self
    }

    /// Enables or disables the synthetic `"system"` theme.
    pub fn with_system(mut self, enabled: bool) -> Self {
        self.enable_system = enabled;
        self
    }

    /// Suppresses CSS transitions while the theme attributes change.
    pub fn with_transitions_disabled(mut self, disabled: bool) -> Self {
        self.disable_transition_on_change = disabled;
        self
    }

    /// Enables or disables writing the native `color-scheme` hint.
    pub fn with_color_scheme(mut self, enabled: bool) -> Self {
        self.enable_color_scheme = enabled;
        self
    }

    /// Sets the key the choice is persisted under.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the theme used when nothing usable is persisted.
    pub fn with_default_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = Some(theme.into());
        self
    }

    /// Writes the theme to a single attribute.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = vec![attribute];
        self
    }

    /// Writes the theme to every listed attribute.
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = Attribute>,
    {
        self.attribute = attributes.into_iter().collect();
        self
    }

    /// Maps theme names to the literal values written to the document.
    pub fn with_value_map<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.value = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Sets the CSP nonce for injected style elements.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Configured theme names, without `"system"`.
    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    /// The forced theme this configuration mounts with.
    pub fn forced_theme(&self) -> Option<&str> {
        self.forced_theme.as_deref()
    }

    /// Whether `"system"` is available and followed.
    pub fn enable_system(&self) -> bool {
        self.enable_system
    }

    /// Whether transitions are suppressed during a change.
    pub fn disable_transition_on_change(&self) -> bool {
        self.disable_transition_on_change
    }

    /// Whether the native `color-scheme` hint is written.
    pub fn enable_color_scheme(&self) -> bool {
        self.enable_color_scheme
    }

    /// Key of the persistence record.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// The effective default theme: the configured one, otherwise `"system"`
    /// when system tracking is enabled and `"light"` when it is not.
    pub fn default_theme(&self) -> &str {
        match &self.default_theme {
            Some(theme) => theme,
            None if self.enable_system => SYSTEM_THEME,
            None => "light",
        }
    }

    /// Attributes the theme is written to.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attribute
    }

    /// Theme name to document value mapping, if configured.
    pub fn value_map(&self) -> Option<&BTreeMap<String, String>> {
        self.value.as_ref()
    }

    /// CSP nonce for injected style elements.
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Theme names offered to consumers: the configured list, plus
    /// `"system"` when system tracking is enabled.
    pub fn exposed_themes(&self) -> Vec<String> {
        let mut themes = self.themes.clone();
        if self.enable_system {
            themes.push(SYSTEM_THEME.to_string());
        }
        themes
    }

    /// The value written to the document for a resolved theme name.
    ///
    /// With a value map, names missing from the map (or mapped to an empty
    /// string) have no value, which clears the attribute.
    pub fn dom_value<'a>(&'a self, resolved: &'a str) -> Option<&'a str> {
        let value = match &self.value {
            Some(map) => map.get(resolved).map(String::as_str),
            None => Some(resolved),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Every class a previous apply could have added.
    pub fn removable_classes(&self) -> Vec<&str> {
        let names: Vec<&str> = match &self.value {
            Some(map) => map.values().map(String::as_str).collect(),
            None => self.themes.iter().map(String::as_str).collect(),
        };
        names.into_iter().filter(|n| !n.is_empty()).collect()
    }
}

fn one_or_many_attributes<'de, D>(deserializer: D) -> Result<Vec<Attribute>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let names = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    };
    names
        .iter()
        .map(|name| name.parse().map_err(serde::de::Error::custom))
        .collect()
}

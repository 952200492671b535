//! The two concrete appearances a theme can resolve to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the synthetic theme that follows the OS color-scheme preference.
pub const SYSTEM_THEME: &str = "system";

/// Media query whose match state means the OS prefers a dark appearance.
pub const COLOR_SCHEME_QUERY: &str = "(prefers-color-scheme: dark)";

/// A concrete light or dark appearance.
///
/// This is what `"system"` resolves to, and the only thing a resolved theme
/// or an observed OS preference can ever be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    /// Light background, dark text.
    Light,
    /// Dark background, light text.
    Dark,
}

impl Appearance {
    /// The lowercase name, which is also the native `color-scheme` keyword.
    pub const fn as_str(self) -> &'static str {
        match self {
            Appearance::Light => "light",
            Appearance::Dark => "dark",
        }
    }

    /// Maps a theme name to an appearance, if it names one.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "light" => Some(Appearance::Light),
            "dark" => Some(Appearance::Dark),
            _ => None,
        }
    }

    /// Maps the match state of [`COLOR_SCHEME_QUERY`] to an appearance.
    pub const fn from_prefers_dark(prefers_dark: bool) -> Self {
        if prefers_dark {
            Appearance::Dark
        } else {
            Appearance::Light
        }
    }
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Appearance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Appearance::from_name(s).ok_or_else(|| format!("'{}' is not a color scheme", s))
    }
}

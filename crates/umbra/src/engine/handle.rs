//! The consumer-facing handle.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use super::EngineInner;
use crate::appearance::Appearance;
use crate::env::Subscription;

/// Everything a consumer can read about the current theme.
///
/// From a mounted engine `theme` and `resolved_theme` are always `Some`. The
/// [`Default`] value is what a detached handle reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSnapshot {
    /// The requested theme, possibly `"system"`.
    pub theme: Option<String>,
    /// The concrete appearance of the requested theme.
    pub resolved_theme: Option<Appearance>,
    /// The OS preference, when system tracking is enabled.
    pub system_theme: Option<Appearance>,
    /// Theme names to offer, including `"system"` when enabled.
    pub themes: Vec<String>,
    /// The theme forced for display, if any.
    pub forced_theme: Option<String>,
}

/// Read/write access to a mounted engine, passed down to whatever UI needs it.
///
/// Handles are cheap to clone and never keep the engine alive. Once the
/// engine is unmounted, or for a handle made with [`ThemeHandle::detached`],
/// reads return [`ThemeSnapshot::default`] and writes do nothing.
#[derive(Clone, Default)]
pub struct ThemeHandle {
    engine: Weak<EngineInner>,
}

impl ThemeHandle {
    pub(super) fn new(engine: Weak<EngineInner>) -> Self {
        Self { engine }
    }

    /// A handle not connected to any engine.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Whether the engine behind this handle is still mounted.
    pub fn is_mounted(&self) -> bool {
        self.engine.strong_count() > 0
    }

    /// Everything readable, in one value.
    pub fn snapshot(&self) -> ThemeSnapshot {
        self.engine
            .upgrade()
            .map(|engine| engine.snapshot())
            .unwrap_or_default()
    }

    /// The requested theme.
    pub fn theme(&self) -> Option<String> {
        self.snapshot().theme
    }

    /// The concrete appearance of the requested theme.
    pub fn resolved_theme(&self) -> Option<Appearance> {
        self.snapshot().resolved_theme
    }

    /// The OS preference, when system tracking is enabled.
    pub fn system_theme(&self) -> Option<Appearance> {
        self.snapshot().system_theme
    }

    /// Theme names to offer.
    pub fn themes(&self) -> Vec<String> {
        self.snapshot().themes
    }

    /// The theme forced for display.
    pub fn forced_theme(&self) -> Option<String> {
        self.snapshot().forced_theme
    }

    /// Requests a theme.
    ///
    /// Any string is accepted; names the configuration does not know simply
    /// clear the theme attributes. The choice is persisted on a best-effort
    /// basis: if the store rejects the write, the in-memory theme still
    /// changes and nothing is reported.
    pub fn set_theme(&self, theme: impl Into<String>) {
        if let Some(engine) = self.engine.upgrade() {
            engine.set_theme(theme.into());
        }
    }

    /// Registers an observer for committed state changes. Returns an inactive
    /// subscription when detached.
    pub fn subscribe(&self, observer: impl Fn(&ThemeSnapshot) + 'static) -> Subscription {
        match self.engine.upgrade() {
            Some(engine) => EngineInner::subscribe(&engine, Rc::new(observer)),
            None => Subscription::empty(),
        }
    }
}

impl fmt::Debug for ThemeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeHandle")
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

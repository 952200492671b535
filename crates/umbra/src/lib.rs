//! Light/dark theme management.
//!
//! `umbra` keeps a document's theme in step with three sources of truth:
//! the theme the user picked, the operating system's color-scheme
//! preference, and a persisted value that other contexts (tabs, windows,
//! processes) may change at any time.
//!
//! # Quick Start
//!
//! ```rust
//! use umbra::memory::MemoryPlatform;
//! use umbra::{Appearance, Attribute, ThemeConfig, ThemeEngine};
//!
//! let mem = MemoryPlatform::new(Appearance::Dark);
//! let config = ThemeConfig::new().with_attribute(Attribute::data("theme"));
//! let engine = ThemeEngine::mount(config, mem.platform());
//!
//! // No stored choice: follow the OS.
//! assert_eq!(engine.theme(), "system");
//! assert_eq!(mem.document.attribute("data-theme").as_deref(), Some("dark"));
//!
//! engine.set_theme("light");
//! assert_eq!(mem.document.attribute("data-theme").as_deref(), Some("light"));
//! assert_eq!(mem.storage.value("theme").as_deref(), Some("light"));
//! ```
//!
//! # Architecture
//!
//! The engine never touches a browser or the OS directly. It talks to four
//! boundaries, bundled in a [`Platform`]:
//!
//! ```text
//! ThemeEngine
//! ├── PreferenceStore    get / set / remove / watch the stored theme
//! ├── ColorSchemeSource  current OS preference + change notifications
//! ├── Document           root classes, attributes, color-scheme, <style>
//! └── Scheduler          deferred removal of the transition blocker
//! ```
//!
//! Implementations:
//!
//! - [`memory`]: in-memory, for tests and headless use
//! - `native`: a JSON preference file plus OS detection (not on wasm32)
//! - `web`: `localStorage`, `matchMedia` and the live DOM (wasm32 only)
//!
//! # Configuration
//!
//! [`ThemeConfig`] is built in code or loaded from YAML/JSON; see the
//! [`config`] module.

mod appearance;
pub mod config;
mod engine;
pub mod env;
mod error;
pub mod memory;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use appearance::{Appearance, COLOR_SCHEME_QUERY, SYSTEM_THEME};
pub use config::{Attribute, ThemeConfig, CONFIG_EXTENSIONS};
pub use engine::{
    ThemeEngine, ThemeHandle, ThemeSnapshot, DISABLE_TRANSITIONS_CSS, TRANSITION_RESTORE_DELAY,
};
pub use env::{
    ColorSchemeSource, Document, Platform, PreferenceStore, Scheduler, StorageEvent, StyleId,
    Subscription,
};
pub use error::{ConfigError, PlatformError, StorageError};

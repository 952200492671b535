//! The theme engine.
//!
//! A [`ThemeEngine`] reconciles three sources of truth into what the document
//! shows:
//!
//! 1. the theme the user asked for ([`set_theme`](ThemeEngine::set_theme)),
//! 2. the OS light/dark preference (a [`ColorSchemeSource`] listener),
//! 3. the persisted choice, which other contexts may rewrite (a
//!    [`PreferenceStore`] listener).
//!
//! A forced theme overrides all three for display without touching state.
//!
//! ## State
//!
//! The engine stores the requested `theme` and the last observed
//! `system_theme`. The resolved appearance is derived on every read, so a
//! `"system"` theme can never disagree with the OS preference it follows.
//!
//! ## Lifecycle
//!
//! [`ThemeEngine::mount`] seeds state from the store, registers both
//! listeners and applies once. Dropping the engine (or calling
//! [`unmount`](ThemeEngine::unmount)) deregisters the listeners. Consumers get
//! a [`ThemeHandle`] that stays valid, but inert, after unmount.
//!
//! [`ColorSchemeSource`]: crate::env::ColorSchemeSource
//! [`PreferenceStore`]: crate::env::PreferenceStore

mod apply;
mod handle;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::appearance::{Appearance, SYSTEM_THEME};
use crate::config::ThemeConfig;
use crate::env::{Platform, StorageEvent, Subscription};

pub use apply::{DISABLE_TRANSITIONS_CSS, TRANSITION_RESTORE_DELAY};
pub use handle::{ThemeHandle, ThemeSnapshot};

type Observer = Rc<dyn Fn(&ThemeSnapshot)>;

#[derive(Debug)]
struct ThemeState {
    theme: String,
    system_theme: Appearance,
    forced_theme: Option<String>,
}

pub(crate) struct EngineInner {
    config: ThemeConfig,
    platform: Platform,
    state: RefCell<ThemeState>,
    observers: RefCell<Vec<(u64, Observer)>>,
    next_observer: Cell<u64>,
}

/// A mounted theme engine.
///
/// # Example
///
/// ```rust
/// use umbra::memory::MemoryPlatform;
/// use umbra::{Appearance, ThemeConfig, ThemeEngine};
///
/// let mem = MemoryPlatform::new(Appearance::Light);
/// let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
///
/// assert_eq!(engine.theme(), "system");
/// assert_eq!(engine.resolved_theme(), Appearance::Light);
///
/// engine.set_theme("dark");
/// assert!(mem.document.has_class("dark"));
/// assert_eq!(mem.storage.value("theme").as_deref(), Some("dark"));
/// ```
pub struct ThemeEngine {
    inner: Rc<EngineInner>,
    listeners: Vec<Subscription>,
}

impl ThemeEngine {
    /// Mounts an engine: seeds state, registers listeners, applies once.
    ///
    /// The persisted value for the storage key seeds the theme. When it is
    /// absent, empty, or the store fails, the configured default is used.
    pub fn mount(config: ThemeConfig, platform: Platform) -> Self {
        let theme = stored_theme(&platform, config.storage_key())
            .unwrap_or_else(|| config.default_theme().to_string());
        let state = ThemeState {
            theme,
            system_theme: platform.scheme.current(),
            forced_theme: config.forced_theme().map(str::to_string),
        };
        debug!(
            theme = %state.theme,
            system = %state.system_theme,
            forced = ?state.forced_theme,
            storage_key = config.storage_key(),
            "mounting theme engine"
        );

        let inner = Rc::new(EngineInner {
            config,
            platform,
            state: RefCell::new(state),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(0),
        });

        let listeners = vec![
            EngineInner::watch_color_scheme(&inner),
            EngineInner::watch_storage(&inner),
        ];
        inner.apply_effective();

        Self { inner, listeners }
    }

    /// Deregisters the listeners and drops the engine.
    pub fn unmount(self) {
        drop(self);
    }

    /// A handle for consumers. Handles never keep the engine alive.
    pub fn handle(&self) -> ThemeHandle {
        ThemeHandle::new(Rc::downgrade(&self.inner))
    }

    /// The configuration this engine was mounted with.
    pub fn config(&self) -> &ThemeConfig {
        &self.inner.config
    }

    /// The requested theme, possibly `"system"`.
    pub fn theme(&self) -> String {
        self.inner.state.borrow().theme.clone()
    }

    /// The concrete appearance of the requested theme.
    pub fn resolved_theme(&self) -> Appearance {
        self.inner.resolved_theme(&self.inner.state.borrow())
    }

    /// The OS preference, when system tracking is enabled.
    pub fn system_theme(&self) -> Option<Appearance> {
        self.inner
            .config
            .enable_system()
            .then(|| self.inner.state.borrow().system_theme)
    }

    /// The active forced theme.
    pub fn forced_theme(&self) -> Option<String> {
        self.inner.state.borrow().forced_theme.clone()
    }

    /// Theme names offered to consumers.
    pub fn themes(&self) -> Vec<String> {
        self.inner.config.exposed_themes()
    }

    /// Everything a consumer can read, in one value.
    pub fn snapshot(&self) -> ThemeSnapshot {
        self.inner.snapshot()
    }

    /// Requests a theme. See [`ThemeHandle::set_theme`].
    pub fn set_theme(&self, theme: impl Into<String>) {
        self.inner.set_theme(theme.into());
    }

    /// Forces (or with `None`, un-forces) the displayed theme.
    ///
    /// The requested theme and the persisted value are left alone.
    pub fn set_forced_theme(&self, forced: Option<String>) {
        self.inner.set_forced_theme(forced);
    }

    /// Registers an observer called with a fresh snapshot after every
    /// committed state change.
    pub fn subscribe(&self, observer: impl Fn(&ThemeSnapshot) + 'static) -> Subscription {
        EngineInner::subscribe(&self.inner, Rc::new(observer))
    }
}

impl Drop for ThemeEngine {
    fn drop(&mut self) {
        debug!(listeners = self.listeners.len(), "unmounting theme engine");
        for listener in self.listeners.drain(..) {
            listener.cancel();
        }
    }
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("state", &self.inner.state.borrow())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn stored_theme(platform: &Platform, key: &str) -> Option<String> {
    // Unreadable storage counts as "nothing stored".
    platform
        .store
        .get(key)
        .ok()
        .flatten()
        .filter(|value| !value.is_empty())
}

impl EngineInner {
    fn watch_color_scheme(this: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(this);
        this.platform.scheme.watch(Rc::new(move |appearance: Appearance| {
            if let Some(inner) = weak.upgrade() {
                inner.on_system_change(appearance);
            }
        }))
    }

    fn watch_storage(this: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(this);
        this.platform.store.watch(Rc::new(move |event: &StorageEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_storage_event(event);
            }
        }))
    }

    fn subscribe(this: &Rc<Self>, observer: Observer) -> Subscription {
        let id = this.next_observer.get();
        this.next_observer.set(id + 1);
        this.observers.borrow_mut().push((id, observer));

        let weak: Weak<Self> = Rc::downgrade(this);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|(oid, _)| *oid != id);
            }
        })
    }

    fn resolved_theme(&self, state: &ThemeState) -> Appearance {
        if state.theme == SYSTEM_THEME {
            return state.system_theme;
        }
        // Custom theme names fall back to the default's appearance, then
        // to whatever the OS prefers.
        Appearance::from_name(&state.theme)
            .or_else(|| Appearance::from_name(self.config.default_theme()))
            .unwrap_or(state.system_theme)
    }

    pub(crate) fn snapshot(&self) -> ThemeSnapshot {
        let state = self.state.borrow();
        ThemeSnapshot {
            theme: Some(state.theme.clone()),
            resolved_theme: Some(self.resolved_theme(&state)),
            system_theme: self.config.enable_system().then_some(state.system_theme),
            themes: self.config.exposed_themes(),
            forced_theme: state.forced_theme.clone(),
        }
    }

    pub(crate) fn set_theme(&self, theme: String) {
        debug!(theme = %theme, "set_theme");
        self.state.borrow_mut().theme = theme.clone();
        // Persistence is best effort; in-memory state stays authoritative.
        let _ = self
            .platform
            .store
            .set(self.config.storage_key(), &theme);
        self.apply_effective();
        self.notify();
    }

    fn set_forced_theme(&self, forced: Option<String>) {
        debug!(forced = ?forced, "set_forced_theme");
        self.state.borrow_mut().forced_theme = forced;
        self.apply_effective();
        self.notify();
    }

    fn on_system_change(&self, appearance: Appearance) {
        let repaint = {
            let mut state = self.state.borrow_mut();
            state.system_theme = appearance;
            state.theme == SYSTEM_THEME
                && self.config.enable_system()
                && state.forced_theme.is_none()
        };
        debug!(system = %appearance, repaint, "OS color scheme changed");
        if repaint {
            self.apply_theme(SYSTEM_THEME);
        }
        self.notify();
    }

    fn on_storage_event(&self, event: &StorageEvent) {
        if event.key.as_deref() != Some(self.config.storage_key()) {
            trace!(key = ?event.key, "ignoring storage event for another key");
            return;
        }
        let theme = match event.new_value.as_deref() {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => self.config.default_theme().to_string(),
        };
        debug!(theme = %theme, "theme changed in another context");
        // Adopt without writing back: this context did not originate it.
        self.state.borrow_mut().theme = theme;
        self.apply_effective();
        self.notify();
    }

    fn apply_effective(&self) {
        let effective = {
            let state = self.state.borrow();
            state
                .forced_theme
                .clone()
                .unwrap_or_else(|| state.theme.clone())
        };
        self.apply_theme(&effective);
    }

    fn notify(&self) {
        let observers: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        if observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in observers {
            observer(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPlatform;

    #[test]
    fn seeds_from_store() {
        let mem = MemoryPlatform::new(Appearance::Light);
        mem.storage.seed("theme", "dark");
        let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
        assert_eq!(engine.theme(), "dark");
        assert!(mem.document.has_class("dark"));
    }

    #[test]
    fn empty_stored_value_uses_default() {
        let mem = MemoryPlatform::new(Appearance::Dark);
        mem.storage.seed("theme", "");
        let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
        assert_eq!(engine.theme(), "system");
        assert_eq!(engine.resolved_theme(), Appearance::Dark);
    }

    #[test]
    fn unreadable_store_uses_default() {
        let mem = MemoryPlatform::new(Appearance::Dark);
        mem.storage.set_disabled(true);
        let config = ThemeConfig::new().with_system(false);
        let engine = ThemeEngine::mount(config, mem.platform());
        assert_eq!(engine.theme(), "light");
        assert!(mem.document.has_class("light"));
    }

    #[test]
    fn custom_theme_resolves_through_default_then_os() {
        let mem = MemoryPlatform::new(Appearance::Dark);
        let config = ThemeConfig::new()
            .with_themes(["light", "dark", "sepia"])
            .with_default_theme("light");
        let engine = ThemeEngine::mount(config, mem.platform());
        engine.set_theme("sepia");
        assert_eq!(engine.resolved_theme(), Appearance::Light);

        let mem = MemoryPlatform::new(Appearance::Dark);
        let config = ThemeConfig::new().with_themes(["sepia"]);
        let engine = ThemeEngine::mount(config, mem.platform());
        engine.set_theme("sepia");
        assert_eq!(engine.resolved_theme(), Appearance::Dark);
    }

    #[test]
    fn system_theme_hidden_when_disabled() {
        let mem = MemoryPlatform::new(Appearance::Dark);
        let engine = ThemeEngine::mount(ThemeConfig::new().with_system(false), mem.platform());
        assert_eq!(engine.system_theme(), None);
        assert_eq!(engine.snapshot().system_theme, None);
        assert_eq!(engine.themes(), ["light", "dark"]);
    }

    #[test]
    fn drop_deregisters_listeners() {
        let mem = MemoryPlatform::new(Appearance::Light);
        let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
        assert_eq!(mem.scheme.listener_count(), 1);
        assert_eq!(mem.storage.listener_count(), 1);

        engine.unmount();
        assert_eq!(mem.scheme.listener_count(), 0);
        assert_eq!(mem.storage.listener_count(), 0);
    }

    #[test]
    fn observers_see_committed_state() {
        let mem = MemoryPlatform::new(Appearance::Light);
        let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = engine.subscribe(move |snap| sink.borrow_mut().push(snap.clone()));

        engine.set_theme("dark");
        mem.scheme.set(Appearance::Dark);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].theme.as_deref(), Some("dark"));
        assert_eq!(seen[0].system_theme, Some(Appearance::Light));
        assert_eq!(seen[1].system_theme, Some(Appearance::Dark));
    }

    #[test]
    fn observer_may_set_theme_reentrantly() {
        let mem = MemoryPlatform::new(Appearance::Light);
        let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
        let handle = engine.handle();
        let _sub = engine.subscribe(move |snap| {
            if snap.theme.as_deref() == Some("sepia") {
                handle.set_theme("dark");
            }
        });

        engine.set_theme("sepia");
        assert_eq!(engine.theme(), "dark");
        assert!(mem.document.has_class("dark"));
    }
}

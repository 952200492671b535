//! Platform abstractions the engine talks through.
//!
//! The engine never touches a browser, the OS, or the filesystem directly.
//! Everything it needs is one of four traits:
//!
//! - [`ColorSchemeSource`]: the OS light/dark preference and its changes
//! - [`PreferenceStore`]: key/value storage shared with other contexts
//! - [`Document`]: the root element the theme is written to
//! - [`Scheduler`]: deferred callbacks
//!
//! [`Platform`] bundles one of each. Implementations live in
//! [`memory`](crate::memory) (tests and headless hosts),
//! `native` (desktop/CLI) and `web` (wasm32 browsers).
//!
//! Everything here is single-threaded: listeners are `Rc` closures and none of
//! the traits require `Send`.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::appearance::Appearance;
use crate::error::StorageError;

/// Callback receiving a new OS color-scheme preference.
pub type SchemeListener = Rc<dyn Fn(Appearance)>;

/// Callback receiving a storage change made by another context.
pub type StorageListener = Rc<dyn Fn(&StorageEvent)>;

/// A storage write observed from another context sharing the same store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed. `None` when the whole store was cleared.
    pub key: Option<String>,
    /// The value after the change. `None` when the key was removed.
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// An event for a key written to `value`.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value: Some(value.into()),
        }
    }

    /// An event for a removed key.
    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value: None,
        }
    }
}

/// Registration handle for a listener.
///
/// The listener is deregistered exactly once: when [`cancel`](Self::cancel)
/// is called or when the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription deregisters its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wraps the function that deregisters the listener.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to deregister.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Deregisters the listener now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The OS-level light/dark preference.
pub trait ColorSchemeSource {
    /// Queries the preference right now.
    fn current(&self) -> Appearance;

    /// Registers a listener for preference changes.
    fn watch(&self, listener: SchemeListener) -> Subscription;
}

/// Key/value storage scoped to one origin and shared between its contexts.
///
/// Implementations report failures as `Err`; callers decide what a failure
/// means. Listeners only hear about writes made by *other* contexts.
pub trait PreferenceStore {
    /// Reads a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Registers a listener for changes made by other contexts.
    fn watch(&self, listener: StorageListener) -> Subscription;
}

/// Identifies a style element inserted through [`Document::insert_style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleId(u64);

impl StyleId {
    /// Wraps an implementation-defined identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The implementation-defined identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The document whose root element carries the theme.
pub trait Document {
    /// Removes each listed class from the root element.
    fn remove_classes(&self, names: &[&str]);

    /// Adds a class to the root element.
    fn add_class(&self, name: &str);

    /// Sets an attribute on the root element.
    fn set_attribute(&self, name: &str, value: &str);

    /// Removes an attribute from the root element.
    fn remove_attribute(&self, name: &str);

    /// Sets (or with `None`, clears) the root's native `color-scheme` hint.
    fn set_color_scheme(&self, scheme: Option<&str>);

    /// Appends a style element with the given CSS to the document head.
    ///
    /// Returns `None` if the element could not be inserted.
    fn insert_style(&self, css: &str, nonce: Option<&str>) -> Option<StyleId>;

    /// Removes a style element previously inserted by this document.
    fn remove_style(&self, id: StyleId);

    /// Forces a synchronous style/layout computation so pending style changes
    /// are committed before the next mutation is observed.
    fn force_reflow(&self);
}

/// Runs callbacks later on the same thread.
pub trait Scheduler {
    /// Runs `task` once after roughly `delay`.
    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

/// The four boundaries a [`ThemeEngine`](crate::ThemeEngine) is mounted against.
#[derive(Clone)]
pub struct Platform {
    pub(crate) store: Rc<dyn PreferenceStore>,
    pub(crate) scheme: Rc<dyn ColorSchemeSource>,
    pub(crate) document: Rc<dyn Document>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
}

impl Platform {
    /// Bundles one implementation of each boundary.
    pub fn new<P, C, D, S>(store: P, scheme: C, document: D, scheduler: S) -> Self
    where
        P: PreferenceStore + 'static,
        C: ColorSchemeSource + 'static,
        D: Document + 'static,
        S: Scheduler + 'static,
    {
        Self {
            store: Rc::new(store),
            scheme: Rc::new(scheme),
            document: Rc::new(document),
            scheduler: Rc::new(scheduler),
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscription_cancels_once_on_drop() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn explicit_cancel_does_not_run_again_on_drop() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        sub.cancel();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn empty_subscription_is_inactive() {
        assert!(!Subscription::empty().is_active());
    }

    #[test]
    fn storage_event_constructors() {
        assert_eq!(
            StorageEvent::set("theme", "dark"),
            StorageEvent {
                key: Some("theme".into()),
                new_value: Some("dark".into())
            }
        );
        assert_eq!(StorageEvent::removed("theme").new_value, None);
    }
}

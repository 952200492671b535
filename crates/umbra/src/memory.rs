//! In-memory platform for tests and headless hosts.
//!
//! Every type here is a cheap `Rc` handle: clone it, hand one clone to
//! [`Platform::new`], and keep the other to drive and inspect it.
//!
//! ```rust
//! use umbra::memory::MemoryPlatform;
//! use umbra::{Appearance, ThemeConfig, ThemeEngine};
//!
//! let mem = MemoryPlatform::new(Appearance::Dark);
//! let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
//!
//! assert!(mem.document.has_class("dark"));
//! mem.scheme.set(Appearance::Light);
//! assert!(mem.document.has_class("light"));
//! # drop(engine);
//! ```
//!
//! [`MemoryStorage`] models one origin's storage as seen by several contexts
//! (browser tabs): [`open_context`](MemoryStorage::open_context) returns a
//! second view of the same data, and writes made through one view are
//! delivered to listeners registered through the others.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::appearance::Appearance;
use crate::env::{
    ColorSchemeSource, Document, Platform, PreferenceStore, Scheduler, SchemeListener,
    StorageEvent, StorageListener, StyleId, Subscription,
};
use crate::error::StorageError;

// === Storage ===

#[derive(Default)]
struct StorageArea {
    entries: BTreeMap<String, String>,
    listeners: Vec<(u64, u64, StorageListener)>,
    next_listener: u64,
    next_context: u64,
    disabled: bool,
    reject_writes: bool,
    writes: usize,
}

/// One context's view of a shared in-memory storage area.
#[derive(Clone)]
pub struct MemoryStorage {
    area: Rc<RefCell<StorageArea>>,
    context: u64,
}

impl MemoryStorage {
    /// Creates an empty storage area and opens the first context on it.
    pub fn new() -> Self {
        let area = StorageArea {
            next_context: 1,
            ..StorageArea::default()
        };
        Self {
            area: Rc::new(RefCell::new(area)),
            context: 0,
        }
    }

    /// Seeds a value without counting it as a write or notifying anyone.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        self.area
            .borrow_mut()
            .entries
            .insert(key.into(), value.into());
    }

    /// Builder form of [`seed`](Self::seed).
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.seed(key, value);
        self
    }

    /// Opens another context over the same storage area.
    pub fn open_context(&self) -> Self {
        let mut area = self.area.borrow_mut();
        let context = area.next_context;
        area.next_context += 1;
        Self {
            area: Rc::clone(&self.area),
            context,
        }
    }

    /// Makes every read and write fail, like storage disabled by the user.
    pub fn set_disabled(&self, disabled: bool) {
        self.area.borrow_mut().disabled = disabled;
    }

    /// Makes writes fail with [`StorageError::QuotaExceeded`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.area.borrow_mut().reject_writes = reject;
    }

    /// Reads a value directly, bypassing failure simulation.
    pub fn value(&self, key: &str) -> Option<String> {
        self.area.borrow().entries.get(key).cloned()
    }

    /// Number of successful writes and removals across all contexts.
    pub fn writes(&self) -> usize {
        self.area.borrow().writes
    }

    /// Number of listeners registered across all contexts.
    pub fn listener_count(&self) -> usize {
        self.area.borrow().listeners.len()
    }

    /// Applies a change as if it was made by another context: the value is
    /// stored and every listener of *this* context is notified.
    pub fn simulate_external(&self, key: &str, value: Option<&str>) {
        {
            let mut area = self.area.borrow_mut();
            match value {
                Some(v) => area.entries.insert(key.to_string(), v.to_string()),
                None => area.entries.remove(key),
            };
        }
        let event = StorageEvent {
            key: Some(key.to_string()),
            new_value: value.map(str::to_string),
        };
        let listeners = self.listeners_where(|context| context == self.context);
        for listener in listeners {
            listener(&event);
        }
    }

    fn listeners_where(&self, pred: impl Fn(u64) -> bool) -> Vec<StorageListener> {
        self.area
            .borrow()
            .listeners
            .iter()
            .filter(|(context, _, _)| pred(*context))
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        let area = self.area.borrow();
        if area.disabled {
            return Err(StorageError::Unavailable("storage is disabled".into()));
        }
        if area.reject_writes {
            return Err(StorageError::QuotaExceeded);
        }
        Ok(())
    }

    fn commit(&self, key: &str, value: Option<&str>) {
        let changed = {
            let mut area = self.area.borrow_mut();
            area.writes += 1;
            let previous = match value {
                Some(v) => area.entries.insert(key.to_string(), v.to_string()),
                None => area.entries.remove(key),
            };
            previous.as_deref() != value
        };

        // Other contexts only hear about writes that changed something.
        if changed {
            let event = StorageEvent {
                key: Some(key.to_string()),
                new_value: value.map(str::to_string),
            };
            for listener in self.listeners_where(|context| context != self.context) {
                listener(&event);
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let area = self.area.borrow();
        f.debug_struct("MemoryStorage")
            .field("context", &self.context)
            .field("entries", &area.entries)
            .field("disabled", &area.disabled)
            .finish()
    }
}

impl PreferenceStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let area = self.area.borrow();
        if area.disabled {
            return Err(StorageError::Unavailable("storage is disabled".into()));
        }
        Ok(area.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.commit(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.commit(key, None);
        Ok(())
    }

    fn watch(&self, listener: StorageListener) -> Subscription {
        let id = {
            let mut area = self.area.borrow_mut();
            let id = area.next_listener;
            area.next_listener += 1;
            area.listeners.push((self.context, id, listener));
            id
        };
        let area: Weak<RefCell<StorageArea>> = Rc::downgrade(&self.area);
        Subscription::new(move || {
            if let Some(area) = area.upgrade() {
                area.borrow_mut().listeners.retain(|(_, lid, _)| *lid != id);
            }
        })
    }
}

// === Color scheme ===

struct SchemeState {
    current: Appearance,
    listeners: Vec<(u64, SchemeListener)>,
    next_listener: u64,
}

/// A color-scheme preference set by hand.
#[derive(Clone)]
pub struct MemoryColorScheme {
    state: Rc<RefCell<SchemeState>>,
}

impl MemoryColorScheme {
    /// Starts with the given preference.
    pub fn new(initial: Appearance) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchemeState {
                current: initial,
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Changes the preference, notifying listeners if it differs.
    pub fn set(&self, appearance: Appearance) {
        let listeners: Vec<SchemeListener> = {
            let mut state = self.state.borrow_mut();
            if state.current == appearance {
                return;
            }
            state.current = appearance;
            state.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
        };
        for listener in listeners {
            listener(appearance);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }
}

impl fmt::Debug for MemoryColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryColorScheme")
            .field("current", &self.state.borrow().current)
            .finish()
    }
}

impl ColorSchemeSource for MemoryColorScheme {
    fn current(&self) -> Appearance {
        self.state.borrow().current
    }

    fn watch(&self, listener: SchemeListener) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.push((id, listener));
            id
        };
        let state = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }
}

// === Document ===

/// A style element held by a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedStyle {
    /// Identifier returned from `insert_style`.
    pub id: StyleId,
    /// The element's CSS text.
    pub css: String,
    /// The element's `nonce` attribute.
    pub nonce: Option<String>,
}

#[derive(Debug, Default)]
struct DocumentState {
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    color_scheme: Option<String>,
    styles: Vec<InsertedStyle>,
    next_style: u64,
    reflows: usize,
}

/// A root element plus head, recorded in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl MemoryDocument {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root's classes, in insertion order.
    pub fn classes(&self) -> Vec<String> {
        self.state.borrow().classes.clone()
    }

    /// Whether the root has a class.
    pub fn has_class(&self, name: &str) -> bool {
        self.state.borrow().classes.iter().any(|c| c == name)
    }

    /// Adds a class that was not written by the engine.
    pub fn with_class(self, name: impl Into<String>) -> Self {
        self.add_class(&name.into());
        self
    }

    /// The value of a root attribute.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.state.borrow().attributes.get(name).cloned()
    }

    /// The root's `color-scheme` hint.
    pub fn color_scheme(&self) -> Option<String> {
        self.state.borrow().color_scheme.clone()
    }

    /// Style elements currently in the head.
    pub fn styles(&self) -> Vec<InsertedStyle> {
        self.state.borrow().styles.clone()
    }

    /// How many times a reflow was forced.
    pub fn reflows(&self) -> usize {
        self.state.borrow().reflows
    }
}

impl Document for MemoryDocument {
    fn remove_classes(&self, names: &[&str]) {
        self.state
            .borrow_mut()
            .classes
            .retain(|c| !names.contains(&c.as_str()));
    }

    fn add_class(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        if !state.classes.iter().any(|c| c == name) {
            state.classes.push(name.to_string());
        }
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.state
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.state.borrow_mut().attributes.remove(name);
    }

    fn set_color_scheme(&self, scheme: Option<&str>) {
        self.state.borrow_mut().color_scheme = scheme.map(str::to_string);
    }

    fn insert_style(&self, css: &str, nonce: Option<&str>) -> Option<StyleId> {
        let mut state = self.state.borrow_mut();
        let id = StyleId::new(state.next_style);
        state.next_style += 1;
        state.styles.push(InsertedStyle {
            id,
            css: css.to_string(),
            nonce: nonce.map(str::to_string),
        });
        Some(id)
    }

    fn remove_style(&self, id: StyleId) {
        self.state.borrow_mut().styles.retain(|s| s.id != id);
    }

    fn force_reflow(&self) {
        self.state.borrow_mut().reflows += 1;
    }
}

// === Scheduler ===

type Task = (Duration, Box<dyn FnOnce()>);

/// A scheduler whose deferred tasks run only when asked to.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl ManualScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Delays of the waiting tasks, in scheduling order.
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.queue.borrow().iter().map(|(delay, _)| *delay).collect()
    }

    /// Runs every task queued so far and returns how many ran. Tasks queued
    /// while running wait for the next call.
    pub fn run_pending(&self) -> usize {
        let tasks: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
        let count = tasks.len();
        for (_, task) in tasks {
            task();
        }
        count
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back((delay, task));
    }
}

// === Bundle ===

/// One of each in-memory boundary, kept around for inspection.
#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    /// Shared storage, first context.
    pub storage: MemoryStorage,
    /// OS preference.
    pub scheme: MemoryColorScheme,
    /// Root element and head.
    pub document: MemoryDocument,
    /// Deferred tasks.
    pub scheduler: ManualScheduler,
}

impl MemoryPlatform {
    /// Fresh boundaries with the OS preferring `appearance`.
    pub fn new(appearance: Appearance) -> Self {
        Self {
            storage: MemoryStorage::new(),
            scheme: MemoryColorScheme::new(appearance),
            document: MemoryDocument::new(),
            scheduler: ManualScheduler::new(),
        }
    }

    /// Replaces the storage, e.g. with a second context of an existing area.
    pub fn with_storage(mut self, storage: MemoryStorage) -> Self {
        self.storage = storage;
        self
    }

    /// A [`Platform`] backed by clones of these boundaries.
    pub fn platform(&self) -> Platform {
        Platform::new(
            self.storage.clone(),
            self.scheme.clone(),
            self.document.clone(),
            self.scheduler.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn recorder() -> (Rc<RefCell<Vec<StorageEvent>>>, StorageListener) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let listener: StorageListener =
            Rc::new(move |e: &StorageEvent| sink.borrow_mut().push(e.clone()));
        (events, listener)
    }

    #[test]
    fn storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("theme").unwrap(), None);
        storage.set("theme", "dark").unwrap();
        assert_eq!(storage.get("theme").unwrap(), Some("dark".into()));
        storage.remove("theme").unwrap();
        assert_eq!(storage.get("theme").unwrap(), None);
        assert_eq!(storage.writes(), 2);
    }

    #[test]
    fn disabled_storage_fails_reads_and_writes() {
        let storage = MemoryStorage::new().with_entry("theme", "dark");
        storage.set_disabled(true);
        assert!(matches!(storage.get("theme"), Err(StorageError::Unavailable(_))));
        assert!(storage.set("theme", "light").is_err());
        assert_eq!(storage.value("theme"), Some("dark".into()));
    }

    #[test]
    fn rejected_writes_report_quota() {
        let storage = MemoryStorage::new();
        storage.set_reject_writes(true);
        assert!(matches!(
            storage.set("theme", "dark"),
            Err(StorageError::QuotaExceeded)
        ));
        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn writes_notify_other_contexts_only() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_context();
        let (seen_a, listener_a) = recorder();
        let (seen_b, listener_b) = recorder();
        let _sub_a = tab_a.watch(listener_a);
        let _sub_b = tab_b.watch(listener_b);

        tab_a.set("theme", "dark").unwrap();

        assert!(seen_a.borrow().is_empty());
        assert_eq!(*seen_b.borrow(), [StorageEvent::set("theme", "dark")]);
        assert_eq!(tab_b.get("theme").unwrap(), Some("dark".into()));
    }

    #[test]
    fn unchanged_writes_are_not_broadcast() {
        let tab_a = MemoryStorage::new().with_entry("theme", "dark");
        let tab_b = tab_a.open_context();
        let (seen_b, listener_b) = recorder();
        let _sub = tab_b.watch(listener_b);

        tab_a.set("theme", "dark").unwrap();
        assert!(seen_b.borrow().is_empty());
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_context();
        let (seen_b, listener_b) = recorder();
        let sub = tab_b.watch(listener_b);
        assert_eq!(tab_a.listener_count(), 1);

        drop(sub);
        assert_eq!(tab_a.listener_count(), 0);
        tab_a.set("theme", "dark").unwrap();
        assert!(seen_b.borrow().is_empty());
    }

    #[test]
    fn simulate_external_targets_own_listeners() {
        let storage = MemoryStorage::new();
        let (seen, listener) = recorder();
        let _sub = storage.watch(listener);

        storage.simulate_external("theme", None);
        assert_eq!(*seen.borrow(), [StorageEvent::removed("theme")]);
        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn scheme_notifies_on_change_only() {
        let scheme = MemoryColorScheme::new(Appearance::Light);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = scheme.watch(Rc::new(move |_: Appearance| {
            counter.set(counter.get() + 1)
        }));

        scheme.set(Appearance::Light);
        assert_eq!(hits.get(), 0);
        scheme.set(Appearance::Dark);
        assert_eq!(hits.get(), 1);
        assert_eq!(scheme.current(), Appearance::Dark);
    }

    #[test]
    fn document_classes_are_a_set() {
        let doc = MemoryDocument::new();
        doc.add_class("dark");
        doc.add_class("dark");
        doc.add_class("app");
        assert_eq!(doc.classes(), ["dark", "app"]);
        doc.remove_classes(&["dark", "light"]);
        assert_eq!(doc.classes(), ["app"]);
    }

    #[test]
    fn document_styles_insert_and_remove() {
        let doc = MemoryDocument::new();
        let id = doc.insert_style("* {}", Some("n0nce")).unwrap();
        assert_eq!(doc.styles().len(), 1);
        assert_eq!(doc.styles()[0].nonce.as_deref(), Some("n0nce"));
        doc.remove_style(id);
        assert!(doc.styles().is_empty());
    }

    #[test]
    fn manual_scheduler_runs_queued_tasks() {
        let scheduler = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        scheduler.defer(Duration::from_millis(1), Box::new(move || flag.set(true)));

        assert_eq!(scheduler.pending_delays(), [Duration::from_millis(1)]);
        assert!(!ran.get());
        assert_eq!(scheduler.run_pending(), 1);
        assert!(ran.get());
        assert_eq!(scheduler.pending(), 0);
    }
}

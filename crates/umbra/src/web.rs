//! Browser platform (wasm32).
//!
//! Wires the engine to the live page:
//!
//! - [`LocalStorage`]: `window.localStorage` and the `storage` event
//! - [`MediaColorScheme`]: `matchMedia("(prefers-color-scheme: dark)")`
//! - [`DomDocument`]: `document.documentElement` and `<head>`
//! - [`TimeoutScheduler`]: `setTimeout`
//!
//! ```rust,ignore
//! let engine = umbra::ThemeEngine::mount(umbra::ThemeConfig::new(), umbra::web::platform()?);
//! let handle = engine.handle();
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::appearance::{Appearance, COLOR_SCHEME_QUERY};
use crate::env::{
    ColorSchemeSource, Document, Platform, PreferenceStore, Scheduler, SchemeListener,
    StorageEvent, StorageListener, StyleId, Subscription,
};
use crate::error::{PlatformError, StorageError};

/// Builds a [`Platform`] over the current window.
pub fn platform() -> Result<Platform, PlatformError> {
    let window = web_sys::window().ok_or(PlatformError::NoWindow)?;
    Ok(Platform::new(
        LocalStorage::new(window.clone()),
        MediaColorScheme::new(&window)?,
        DomDocument::new(window.clone())?,
        TimeoutScheduler::new(window),
    ))
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

/// `window.localStorage`.
#[derive(Clone)]
pub struct LocalStorage {
    window: web_sys::Window,
}

impl LocalStorage {
    /// Wraps the window's local storage.
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }

    // Looked up per call: access throws in sandboxed frames and when the
    // user has disabled site data.
    fn storage(&self) -> Result<web_sys::Storage, StorageError> {
        match self.window.local_storage() {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(StorageError::Unavailable(
                "localStorage is not available".into(),
            )),
            Err(err) => Err(StorageError::Unavailable(js_message(&err))),
        }
    }
}

impl fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage").finish_non_exhaustive()
    }
}

impl PreferenceStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?
            .get_item(key)
            .map_err(|err| StorageError::Unavailable(js_message(&err)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|err| StorageError::Unavailable(js_message(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?
            .remove_item(key)
            .map_err(|err| StorageError::Unavailable(js_message(&err)))
    }

    fn watch(&self, listener: StorageListener) -> Subscription {
        let closure = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
            move |event: web_sys::StorageEvent| {
                listener(&StorageEvent {
                    key: event.key(),
                    new_value: event.new_value(),
                });
            },
        );
        let added = self
            .window
            .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        if added.is_err() {
            return Subscription::empty();
        }

        let window = self.window.clone();
        Subscription::new(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        })
    }
}

/// The `(prefers-color-scheme: dark)` media query.
#[derive(Clone)]
pub struct MediaColorScheme {
    query: web_sys::MediaQueryList,
}

impl MediaColorScheme {
    /// Evaluates the color-scheme media query on `window`.
    pub fn new(window: &web_sys::Window) -> Result<Self, PlatformError> {
        let query = window
            .match_media(COLOR_SCHEME_QUERY)
            .map_err(|err| PlatformError::Js(js_message(&err)))?
            .ok_or_else(|| PlatformError::Js("matchMedia returned null".into()))?;
        Ok(Self { query })
    }
}

impl fmt::Debug for MediaColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaColorScheme")
            .field("matches", &self.query.matches())
            .finish()
    }
}

impl ColorSchemeSource for MediaColorScheme {
    fn current(&self) -> Appearance {
        Appearance::from_prefers_dark(self.query.matches())
    }

    fn watch(&self, listener: SchemeListener) -> Subscription {
        let closure = Closure::<dyn FnMut(web_sys::MediaQueryListEvent)>::new(
            move |event: web_sys::MediaQueryListEvent| {
                listener(Appearance::from_prefers_dark(event.matches()));
            },
        );
        let added = self
            .query
            .add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        if added.is_err() {
            return Subscription::empty();
        }

        let query = self.query.clone();
        Subscription::new(move || {
            let _ = query
                .remove_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        })
    }
}

/// The page's root element and head.
pub struct DomDocument {
    window: web_sys::Window,
    document: web_sys::Document,
    root: web_sys::HtmlElement,
    styles: RefCell<HashMap<u64, web_sys::Element>>,
    next_style: Cell<u64>,
}

impl DomDocument {
    /// Binds to `window.document.documentElement`.
    pub fn new(window: web_sys::Window) -> Result<Self, PlatformError> {
        let document = window.document().ok_or(PlatformError::MissingNode("document"))?;
        let root = document
            .document_element()
            .ok_or(PlatformError::MissingNode("documentElement"))?
            .dyn_into::<web_sys::HtmlElement>()
            .map_err(|_| PlatformError::MissingNode("HTML root element"))?;
        Ok(Self {
            window,
            document,
            root,
            styles: RefCell::new(HashMap::new()),
            next_style: Cell::new(0),
        })
    }
}

impl fmt::Debug for DomDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomDocument")
            .field("class", &self.root.class_name())
            .field("styles", &self.styles.borrow().len())
            .finish()
    }
}

impl Document for DomDocument {
    fn remove_classes(&self, names: &[&str]) {
        let classes = self.root.class_list();
        for name in names {
            let _ = classes.remove_1(name);
        }
    }

    fn add_class(&self, name: &str) {
        let _ = self.root.class_list().add_1(name);
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let _ = self.root.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) {
        let _ = self.root.remove_attribute(name);
    }

    fn set_color_scheme(&self, scheme: Option<&str>) {
        let style = self.root.style();
        let _ = match scheme {
            Some(scheme) => style.set_property("color-scheme", scheme),
            None => style.remove_property("color-scheme").map(|_| ()),
        };
    }

    fn insert_style(&self, css: &str, nonce: Option<&str>) -> Option<StyleId> {
        let element = self.document.create_element("style").ok()?;
        if let Some(nonce) = nonce {
            element.set_attribute("nonce", nonce).ok()?;
        }
        element.set_text_content(Some(css));
        self.document.head()?.append_child(&element).ok()?;

        let id = self.next_style.get();
        self.next_style.set(id + 1);
        self.styles.borrow_mut().insert(id, element);
        Some(StyleId::new(id))
    }

    fn remove_style(&self, id: StyleId) {
        if let Some(element) = self.styles.borrow_mut().remove(&id.raw()) {
            element.remove();
        }
    }

    fn force_reflow(&self) {
        let Some(body) = self.document.body() else {
            return;
        };
        if let Ok(Some(style)) = self.window.get_computed_style(&body) {
            let _ = style.get_property_value("opacity");
        }
    }
}

/// `window.setTimeout`.
#[derive(Clone)]
pub struct TimeoutScheduler {
    window: web_sys::Window,
}

impl TimeoutScheduler {
    /// Schedules on `window`.
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

impl fmt::Debug for TimeoutScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutScheduler").finish_non_exhaustive()
    }
}

impl Scheduler for TimeoutScheduler {
    fn defer(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        let callback: js_sys::Function = Closure::once_into_js(move || task()).unchecked_into();
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let _ = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&callback, millis);
    }
}

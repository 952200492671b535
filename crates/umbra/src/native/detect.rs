//! OS color-scheme detection for native hosts.
//!
//! Detection goes through a process-wide detector function so tests can pin
//! the answer without touching the OS:
//!
//! ```rust
//! use umbra::Appearance;
//! use umbra::native::{detect_appearance, reset_scheme_detector, set_scheme_detector};
//!
//! set_scheme_detector(|| Appearance::Dark);
//! assert_eq!(detect_appearance(), Appearance::Dark);
//! reset_scheme_detector();
//! ```
//!
//! Native platforms have no change notification, so [`SystemColorScheme`]
//! is polled: each [`poll`](SystemColorScheme::poll) re-detects and notifies
//! watchers when the answer changed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::{Mutex, PoisonError};

use dark_light::Mode as OsMode;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::appearance::Appearance;
use crate::env::{ColorSchemeSource, SchemeListener, Subscription};

type SchemeDetector = fn() -> Appearance;

static SCHEME_DETECTOR: Lazy<Mutex<SchemeDetector>> =
    Lazy::new(|| Mutex::new(os_scheme_detector));

/// Overrides the function used to detect the OS preference.
pub fn set_scheme_detector(detector: SchemeDetector) {
    let mut guard = SCHEME_DETECTOR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = detector;
}

/// Restores detection through the OS.
pub fn reset_scheme_detector() {
    set_scheme_detector(os_scheme_detector);
}

/// Detects the OS light/dark preference.
///
/// An OS that reports no preference, or cannot be queried, counts as light.
pub fn detect_appearance() -> Appearance {
    let detector = *SCHEME_DETECTOR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    detector()
}

fn os_scheme_detector() -> Appearance {
    match dark_light::detect() {
        Ok(OsMode::Dark) => Appearance::Dark,
        _ => Appearance::Light,
    }
}

struct PollState {
    last: Appearance,
    listeners: Vec<(u64, SchemeListener)>,
    next_listener: u64,
}

/// The OS color-scheme preference as of the last poll.
#[derive(Clone)]
pub struct SystemColorScheme {
    state: Rc<RefCell<PollState>>,
}

impl SystemColorScheme {
    /// Detects the current preference and starts tracking from there.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(PollState {
                last: detect_appearance(),
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Re-detects the preference. If it changed since the last poll, watchers
    /// are notified and the new value is returned.
    pub fn poll(&self) -> Option<Appearance> {
        let detected = detect_appearance();
        let listeners: Vec<SchemeListener> = {
            let mut state = self.state.borrow_mut();
            if state.last == detected {
                return None;
            }
            state.last = detected;
            state.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
        };
        debug!(appearance = %detected, "OS color scheme changed");
        for listener in listeners {
            listener(detected);
        }
        Some(detected)
    }
}

impl Default for SystemColorScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemColorScheme")
            .field("last", &self.state.borrow().last)
            .finish()
    }
}

impl ColorSchemeSource for SystemColorScheme {
    /// The value seen by the last [`poll`](SystemColorScheme::poll).
    fn current(&self) -> Appearance {
        self.state.borrow().last
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::cell::Cell;

    #[test]
    #[serial]
    fn detector_override_is_used() {
        set_scheme_detector(|| Appearance::Dark);
        assert_eq!(detect_appearance(), Appearance::Dark);

        set_scheme_detector(|| Appearance::Light);
        assert_eq!(detect_appearance(), Appearance::Light);
        reset_scheme_detector();
    }

    #[test]
    #[serial]
    fn poll_notifies_only_on_change() {
        set_scheme_detector(|| Appearance::Light);
        let scheme = SystemColorScheme::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = scheme.watch(Rc::new(move |_: Appearance| {
            counter.set(counter.get() + 1)
        }));

        assert_eq!(scheme.poll(), None);
        set_scheme_detector(|| Appearance::Dark);
        assert_eq!(scheme.poll(), Some(Appearance::Dark));
        assert_eq!(scheme.poll(), None);
        assert_eq!(hits.get(), 1);
        assert_eq!(scheme.current(), Appearance::Dark);
        reset_scheme_detector();
    }

    #[test]
    #[serial]
    fn current_only_advances_on_poll() {
        set_scheme_detector(|| Appearance::Light);
        let scheme = SystemColorScheme::new();

        set_scheme_detector(|| Appearance::Dark);
        assert_eq!(scheme.current(), Appearance::Light);
        scheme.poll();
        assert_eq!(scheme.current(), Appearance::Dark);
        reset_scheme_detector();
    }
}

//! Native (non-browser) platform.
//!
//! - [`SystemColorScheme`]: OS preference via `dark-light`, polled
//! - [`FileStorage`]: preferences in a JSON file shared between processes
//!
//! A native host has no DOM, so [`NativePlatform`] pairs those with an
//! in-memory document that records what the engine would render, and a
//! manual scheduler drained on every [`poll`](NativePlatform::poll).

mod detect;
mod file;

pub use detect::{detect_appearance, reset_scheme_detector, set_scheme_detector, SystemColorScheme};
pub use file::FileStorage;

use crate::env::Platform;
use crate::memory::{ManualScheduler, MemoryDocument};

/// What a single [`NativePlatform::poll`] observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// The OS preference changed.
    pub scheme_changed: bool,
    /// Number of keys another process changed in the preference file.
    pub storage_changes: usize,
}

impl PollOutcome {
    /// Whether anything changed.
    pub fn any(&self) -> bool {
        self.scheme_changed || self.storage_changes > 0
    }
}

/// File storage and OS detection, with a recorded document.
#[derive(Debug, Clone)]
pub struct NativePlatform {
    /// The preference file.
    pub storage: FileStorage,
    /// The OS preference.
    pub scheme: SystemColorScheme,
    /// What the engine rendered.
    pub document: MemoryDocument,
    /// Deferred tasks, drained by [`poll`](Self::poll).
    pub scheduler: ManualScheduler,
}

impl NativePlatform {
    /// Builds a platform around a preference file.
    pub fn new(storage: FileStorage) -> Self {
        Self {
            storage,
            scheme: SystemColorScheme::new(),
            document: MemoryDocument::new(),
            scheduler: ManualScheduler::new(),
        }
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

    /// Checks the OS preference and the preference file for outside changes,
    /// delivering them to any mounted engine, then runs deferred tasks.
    pub fn poll(&self) -> PollOutcome {
        let scheme_changed = self.scheme.poll().is_some();
        let storage_changes = self.storage.poll().len();
        self.scheduler.run_pending();
        PollOutcome {
            scheme_changed,
            storage_changes,
        }
    }
}

//! File-backed preference store.
//!
//! Preferences live in a small JSON object of string values. Several
//! processes may share one file, which makes each process a separate
//! "context": a process sees its own writes immediately and learns about
//! other processes' writes by calling [`FileStorage::poll`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::env::{PreferenceStore, StorageEvent, StorageListener, Subscription};
use crate::error::StorageError;

const APP_DIR: &str = "umbra";
const FILE_NAME: &str = "preferences.json";

type Entries = BTreeMap<String, String>;

struct FileState {
    // What this process last knew the file to contain.
    known: Entries,
    listeners: Vec<(u64, StorageListener)>,
    next_listener: u64,
}

/// A [`PreferenceStore`] persisted to a JSON file.
#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
    state: Rc<RefCell<FileState>>,
}

impl FileStorage {
    /// Opens (without creating) the store at `path`.
    ///
    /// A missing file reads as empty. It is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let known = read_entries(&path).unwrap_or_default();
        Self {
            path,
            state: Rc::new(RefCell::new(FileState {
                known,
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// `<config dir>/umbra/preferences.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Opens the store at [`default_path`](Self::default_path).
    pub fn open_default() -> Result<Self, StorageError> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| StorageError::Unavailable("no user config directory".into()))
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and reports keys changed by other processes since
    /// the last poll or own write. Listeners receive each event.
    ///
    /// An unreadable file reports nothing.
    pub fn poll(&self) -> Vec<StorageEvent> {
        let current = match read_entries(&self.path) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let (events, listeners) = {
            let mut state = self.state.borrow_mut();
            let events = diff_entries(&state.known, &current);
            if events.is_empty() {
                return events;
            }
            state.known = current;
            let listeners: Vec<StorageListener> =
                state.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
            (events, listeners)
        };

        debug!(changes = events.len(), path = %self.path.display(), "preference file changed");
        for event in &events {
            for listener in &listeners {
                listener(event);
            }
        }
        events
    }

    fn update(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        let mut entries = read_entries(&self.path)?;
        match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };
        write_entries(&self.path, &entries)?;
        trace!(key, value = ?value, path = %self.path.display(), "wrote preference");

        // Own writes are not reported back by poll().
        let mut state = self.state.borrow_mut();
        match value {
            Some(v) => state.known.insert(key.to_string(), v.to_string()),
            None => state.known.remove(key),
        };
        Ok(())
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PreferenceStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(read_entries(&self.path)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(key, None)
    }

    fn watch(&self, listener: StorageListener) -> Subscription {
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

fn read_entries(path: &Path) -> Result<Entries, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
        Err(err) => return Err(err.into()),
    };
    if content.trim().is_empty() {
        return Ok(Entries::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_entries(path: &Path, entries: &Entries) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(entries)?;
    // Write-then-rename so a concurrent reader never sees a half-written file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn diff_entries(before: &Entries, after: &Entries) -> Vec<StorageEvent> {
    let mut events: Vec<StorageEvent> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| StorageEvent::set(key.as_str(), value.as_str()))
        .collect();
    events.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .map(|key| StorageEvent::removed(key.as_str())),
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Entries {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn diff_reports_added_changed_and_removed() {
        let before = entries(&[("theme", "dark"), ("gone", "x"), ("same", "y")]);
        let after = entries(&[("theme", "light"), ("new", "z"), ("same", "y")]);
        let events = diff_entries(&before, &after);
        assert_eq!(
            events,
            [
                StorageEvent::set("new", "z"),
                StorageEvent::set("theme", "light"),
                StorageEvent::removed("gone"),
            ]
        );
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path().join("nope.json"));
        assert_eq!(store.get("theme").unwrap(), None);
    }

    #[test]
    fn writes_create_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = FileStorage::new(&path);
        store.set("theme", "dark").unwrap();
        assert!(path.exists());
        assert_eq!(store.get("theme").unwrap(), Some("dark".into()));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();
        let store = FileStorage::new(&path);
        assert!(matches!(store.get("theme"), Err(StorageError::Corrupt(_))));
        assert!(store.poll().is_empty());
    }
}

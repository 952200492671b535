//! Native platform: two processes sharing one preference file, and OS
//! preference polling through a pinned detector.
#![cfg(not(target_arch = "wasm32"))]

use serial_test::serial;
use umbra::native::{reset_scheme_detector, set_scheme_detector, FileStorage, NativePlatform};
use umbra::{Appearance, PreferenceStore, StorageEvent, ThemeConfig, ThemeEngine};

// ============================================================================
// FileStorage
// ============================================================================

#[test]
fn own_writes_are_not_reported_by_poll() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStorage::new(dir.path().join("prefs.json"));

    store.set("theme", "dark").unwrap();
    assert!(store.poll().is_empty());
}

#[test]
fn poll_reports_other_process_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let first = FileStorage::new(&path);
    let second = FileStorage::new(&path);

    first.set("theme", "dark").unwrap();
    assert_eq!(second.poll(), [StorageEvent::set("theme", "dark")]);
    assert!(second.poll().is_empty());

    first.remove("theme").unwrap();
    assert_eq!(second.poll(), [StorageEvent::removed("theme")]);
}

#[test]
fn writes_keep_unrelated_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let first = FileStorage::new(&path);
    let second = FileStorage::new(&path);

    first.set("locale", "fr").unwrap();
    second.set("theme", "light").unwrap();

    assert_eq!(first.get("locale").unwrap().as_deref(), Some("fr"));
    assert_eq!(first.get("theme").unwrap().as_deref(), Some("light"));
}

#[test]
fn file_is_a_json_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    FileStorage::new(&path).set("theme", "dark").unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["theme"], "dark");
}

// ============================================================================
// NativePlatform
// ============================================================================

/// Pins the OS preference until dropped.
struct PinnedScheme;

impl PinnedScheme {
    fn new(appearance: Appearance) -> Self {
        let pinned = PinnedScheme;
        pinned.set(appearance);
        pinned
    }

    fn set(&self, appearance: Appearance) {
        match appearance {
            Appearance::Light => set_scheme_detector(|| Appearance::Light),
            Appearance::Dark => set_scheme_detector(|| Appearance::Dark),
        }
    }
}

impl Drop for PinnedScheme {
    fn drop(&mut self) {
        reset_scheme_detector();
    }
}

#[test]
#[serial]
fn engines_in_two_processes_converge_on_poll() {
    let _os = PinnedScheme::new(Appearance::Light);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    let host_a = NativePlatform::new(FileStorage::new(&path));
    let host_b = NativePlatform::new(FileStorage::new(&path));
    let engine_a = ThemeEngine::mount(ThemeConfig::new(), host_a.platform());
    let engine_b = ThemeEngine::mount(ThemeConfig::new(), host_b.platform());

    engine_a.set_theme("dark");
    assert_eq!(engine_b.theme(), "system");

    let outcome = host_b.poll();
    assert_eq!(outcome.storage_changes, 1);
    assert!(!outcome.scheme_changed);
    assert_eq!(engine_b.theme(), "dark");
    assert_eq!(host_b.document.classes(), ["dark"]);

    // Nothing new for A: its own write is already known.
    assert!(!host_a.poll().any());
}

#[test]
#[serial]
fn os_change_is_picked_up_on_poll() {
    let os = PinnedScheme::new(Appearance::Light);
    let dir = tempfile::tempdir().unwrap();
    let host = NativePlatform::new(FileStorage::new(dir.path().join("prefs.json")));
    let engine = ThemeEngine::mount(ThemeConfig::new(), host.platform());
    assert_eq!(host.document.classes(), ["light"]);

    os.set(Appearance::Dark);
    let outcome = host.poll();

    assert!(outcome.scheme_changed);
    assert_eq!(engine.system_theme(), Some(Appearance::Dark));
    assert_eq!(engine.resolved_theme(), Appearance::Dark);
    assert_eq!(host.document.classes(), ["dark"]);
}

#[test]
#[serial]
fn poll_drains_transition_blocker() {
    let _os = PinnedScheme::new(Appearance::Light);
    let dir = tempfile::tempdir().unwrap();
    let host = NativePlatform::new(FileStorage::new(dir.path().join("prefs.json")));
    let config = ThemeConfig::new().with_transitions_disabled(true);
    let _engine = ThemeEngine::mount(config, host.platform());
    assert_eq!(host.document.styles().len(), 1);

    host.poll();
    assert!(host.document.styles().is_empty());
}

#[test]
#[serial]
fn system_theme_paints_the_polled_os_value() {
    let os = PinnedScheme::new(Appearance::Light);
    let dir = tempfile::tempdir().unwrap();
    let host = NativePlatform::new(FileStorage::new(dir.path().join("prefs.json")));
    let engine = ThemeEngine::mount(ThemeConfig::new(), host.platform());
    engine.set_theme("light");

    // The OS flips but nobody has polled yet.
    os.set(Appearance::Dark);
    engine.set_theme("system");
    assert_eq!(engine.resolved_theme(), Appearance::Light);
    assert_eq!(host.document.classes(), [engine.resolved_theme().as_str()]);

    host.poll();
    assert_eq!(engine.resolved_theme(), Appearance::Dark);
    assert_eq!(host.document.classes(), [engine.resolved_theme().as_str()]);
}

//! Two engines sharing one storage area, the way two browser tabs of the
//! same origin share `localStorage`.

use umbra::memory::{MemoryPlatform, MemoryStorage};
use umbra::{Appearance, ThemeConfig, ThemeEngine};

fn tabs(os: Appearance) -> (MemoryPlatform, MemoryPlatform) {
    let first = MemoryPlatform::new(os);
    let second = MemoryPlatform::new(os).with_storage(first.storage.open_context());
    (first, second)
}

#[test]
fn set_theme_in_one_tab_converges_the_other() {
    let (mem_a, mem_b) = tabs(Appearance::Light);
    let tab_a = ThemeEngine::mount(ThemeConfig::new(), mem_a.platform());
    let tab_b = ThemeEngine::mount(ThemeConfig::new(), mem_b.platform());

    tab_a.set_theme("dark");

    assert_eq!(tab_b.theme(), "dark");
    assert_eq!(mem_b.document.classes(), ["dark"]);
    // Only tab A wrote; tab B adopted without echoing the write back.
    assert_eq!(mem_a.storage.writes(), 1);
}

#[test]
fn convergence_is_symmetric_and_last_write_wins() {
    let (mem_a, mem_b) = tabs(Appearance::Dark);
    let tab_a = ThemeEngine::mount(ThemeConfig::new(), mem_a.platform());
    let tab_b = ThemeEngine::mount(ThemeConfig::new(), mem_b.platform());

    tab_a.set_theme("light");
    tab_b.set_theme("system");

    assert_eq!(tab_a.theme(), "system");
    assert_eq!(tab_a.resolved_theme(), Appearance::Dark);
    assert_eq!(mem_a.document.classes(), ["dark"]);
    assert_eq!(mem_a.storage.value("theme").as_deref(), Some("system"));
}

#[test]
fn removal_in_another_tab_resets_to_default() {
    let (mem_a, mem_b) = tabs(Appearance::Light);
    let tab_a = ThemeEngine::mount(ThemeConfig::new().with_system(false), mem_a.platform());
    tab_a.set_theme("dark");

    umbra::PreferenceStore::remove(&mem_b.storage, "theme").unwrap();

    assert_eq!(tab_a.theme(), "light");
    assert_eq!(mem_a.document.classes(), ["light"]);
    assert_eq!(mem_a.storage.value("theme"), None);
}

#[test]
fn new_tab_seeds_from_shared_value() {
    let storage = MemoryStorage::new().with_entry("theme", "dark");
    let mem = MemoryPlatform::new(Appearance::Light).with_storage(storage.open_context());

    let engine = ThemeEngine::mount(ThemeConfig::new(), mem.platform());
    assert_eq!(engine.theme(), "dark");
}

#[test]
fn unmounted_tab_stops_listening() {
    let (mem_a, mem_b) = tabs(Appearance::Light);
    let tab_a = ThemeEngine::mount(ThemeConfig::new(), mem_a.platform());
    let tab_b = ThemeEngine::mount(ThemeConfig::new(), mem_b.platform());
    assert_eq!(mem_a.storage.listener_count(), 2);

    tab_b.unmount();
    assert_eq!(mem_a.storage.listener_count(), 1);

    tab_a.set_theme("dark");
    assert_eq!(mem_b.document.classes(), ["light"]);
}

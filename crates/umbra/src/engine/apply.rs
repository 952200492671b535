//! Writing a theme to the document.

use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use super::EngineInner;
use crate::appearance::{Appearance, SYSTEM_THEME};
use crate::config::Attribute;

/// Style rule injected while theme attributes change, so the new theme's
/// colors appear at once instead of cross-fading.
pub const DISABLE_TRANSITIONS_CSS: &str = concat!(
    "*,*::before,*::after{",
    "-webkit-transition:none!important;",
    "-moz-transition:none!important;",
    "-o-transition:none!important;",
    "-ms-transition:none!important;",
    "transition:none!important}",
);

/// Delay before the transition-blocking style is removed again.
pub const TRANSITION_RESTORE_DELAY: Duration = Duration::from_millis(1);

impl EngineInner {
    /// Writes `theme` to every configured attribute and the color-scheme hint.
    ///
    /// An empty theme leaves the document untouched.
    pub(super) fn apply_theme(&self, theme: &str) {
        if theme.is_empty() {
            return;
        }

        let config = &self.config;
        let resolved = if theme == SYSTEM_THEME && config.enable_system() {
            self.platform.scheme.current().as_str()
        } else {
            theme
        };
        let value = config.dom_value(resolved);
        trace!(theme, resolved, value = ?value, "applying theme");

        let document = &self.platform.document;
        let blocker = if config.disable_transition_on_change() {
            document.insert_style(DISABLE_TRANSITIONS_CSS, config.nonce())
        } else {
            None
        };

        for attribute in config.attributes() {
            match attribute {
                Attribute::Class => {
                    document.remove_classes(&config.removable_classes());
                    if let Some(value) = value {
                        document.add_class(value);
                    }
                }
                Attribute::Data(name) => match value {
                    Some(value) => document.set_attribute(name, value),
                    None => document.remove_attribute(name),
                },
            }
        }

        if config.enable_color_scheme() {
            document.set_color_scheme(color_scheme_hint(resolved, config.default_theme()));
        }

        if let Some(style) = blocker {
            document.force_reflow();
            let document = Rc::clone(document);
            self.platform.scheduler.defer(
                TRANSITION_RESTORE_DELAY,
                Box::new(move || document.remove_style(style)),
            );
        }
    }
}

/// The native color-scheme keyword for a resolved theme: the theme itself if
/// it is one, else the default theme if that is one, else nothing.
fn color_scheme_hint(resolved: &str, default_theme: &str) -> Option<&'static str> {
    Appearance::from_name(resolved)
        .or_else(|| Appearance::from_name(default_theme))
        .map(Appearance::as_str)
}

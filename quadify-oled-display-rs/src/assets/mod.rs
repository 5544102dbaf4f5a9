//! Asset cache: service icons and fonts, loaded once at startup.
//!
//! Both caches are immutable after construction and never fail to build.
//! Missing or unreadable files are replaced by a fallback and logged at
//! warning level:
//!
//! - [`IconSet`] maps every configured service name to a 35×35 RGB icon,
//!   substituting the `default` icon (or a grey placeholder) on failure.
//! - [`FontSet`] maps every configured font key to a [`FontHandle`],
//!   substituting the built-in bitmap font on failure.

mod fonts;
mod icons;

pub use fonts::{load_fonts, FontHandle, FontSet, DEFAULT_FONT};
pub use icons::{load_icons, placeholder_icon, IconSet, DEFAULT_ICON_NAME, PLACEHOLDER_GREY};

/// Edge length, in pixels, of every cached icon.
pub const ICON_SIZE: u32 = 35;

/// Services whose menu icons are cached when the configuration does not
/// list its own.
pub const SERVICE_NAMES: [&str; 24] = [
    "stream",
    "library",
    "playlists",
    "qobuz",
    "tidal",
    "airplay",
    "spop",
    "spotify",
    "webradio",
    "motherearthradio",
    "radio_paradise",
    "mpd",
    "default",
    "nas",
    "usb",
    "back",
    "config",
    "irremote",
    "volume",
    "displaysettings",
    "clocksettings",
    "screensaversettings",
    "systeminfo",
    "systemupdate",
];

//! Service configuration.
//!
//! [`DisplayConfig`] is read once when the display service is constructed.
//! It is deserialised from TOML; every key is optional and falls back to the
//! appliance defaults.
//!
//! ```toml
//! icon_dir = "/home/volumio/Quadify/src/assets/images/menus"
//! logo_path = "/home/volumio/Quadify/src/assets/images/logo.gif"
//! ready_gif_path = "/home/volumio/Quadify/src/assets/images/ready.gif"
//!
//! [fonts.menu_font]
//! path = "/home/volumio/Quadify/src/assets/fonts/OpenSans-Regular.ttf"
//! size = 12
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::assets::{ICON_SIZE, SERVICE_NAMES};
use crate::error::OledError;

/// Icon directory used when the configuration does not name one.
pub const DEFAULT_ICON_DIR: &str = "/home/volumio/Quadify/src/assets/images/menus";

/// Point size used for fonts configured without an explicit size.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

// ── FontSpec ─────────────────────────────────────────────────────────────

/// Location and size of one configured font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Path to a TrueType/OpenType file. An entry without one gets the
    /// built-in font.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Pixel size the font is rasterised at. Default: 12.
    #[serde(default = "default_font_size")]
    pub size: f32,
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

// ── DisplayConfig ────────────────────────────────────────────────────────

/// Configuration for the asset cache and the playback routines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Directory holding `<service>.png` icons and `default.png`.
    pub icon_dir: PathBuf,
    /// Logical font key → font file and size.
    pub fonts: BTreeMap<String, FontSpec>,
    /// Boot logo played by `show_logo`. Animated GIF or static image.
    pub logo_path: Option<PathBuf>,
    /// Animation looped by `show_ready_gif_until_event`.
    pub ready_gif_path: Option<PathBuf>,
    /// Service names whose icons are cached at startup.
    pub services: Vec<String>,
    /// Edge length of the square icons, in pixels. Default: 35.
    pub icon_size: u32,
    /// Default duration of the boot logo, in seconds. Default: 5.
    pub logo_duration_secs: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            icon_dir: PathBuf::from(DEFAULT_ICON_DIR),
            fonts: BTreeMap::new(),
            logo_path: None,
            ready_gif_path: None,
            services: SERVICE_NAMES.iter().map(|s| s.to_string()).collect(),
            icon_size: ICON_SIZE,
            logo_duration_secs: 5.0,
        }
    }
}

impl DisplayConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`OledError::Config`] if the text is not valid TOML or a key
    /// has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, OledError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`OledError::Io`] if the file cannot be read, or
    /// [`OledError::Config`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, OledError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Read a configuration file, falling back to [`DisplayConfig::default`]
    /// when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                debug!("Configuration loaded from {}.", path.display());
                config
            }
            Err(OledError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found. Using default configuration.",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                warn!(
                    "Error loading config file {}: {}. Using default configuration.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// The configured logo duration as a [`Duration`].
    ///
    /// Negative or non-finite values collapse to zero.
    pub fn logo_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.logo_duration_secs).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let c = DisplayConfig::default();
        assert_eq!(c.icon_dir, PathBuf::from(DEFAULT_ICON_DIR));
        assert!(c.fonts.is_empty());
        assert!(c.logo_path.is_none());
        assert!(c.ready_gif_path.is_none());
        assert_eq!(c.services.len(), SERVICE_NAMES.len());
        assert_eq!(c.icon_size, 35);
        assert_eq!(c.logo_duration(), Duration::from_secs(5));
    }

    #[test]
    fn parses_partial_toml() {
        let c = DisplayConfig::from_toml_str(
            r#"
            icon_dir = "/tmp/icons"
            logo_path = "/tmp/logo.gif"

            [fonts.menu_font]
            path = "/tmp/OpenSans.ttf"

            [fonts.clock]
            path = "/tmp/Digital.ttf"
            size = 34
            "#,
        )
        .unwrap();

        assert_eq!(c.icon_dir, PathBuf::from("/tmp/icons"));
        assert_eq!(c.logo_path, Some(PathBuf::from("/tmp/logo.gif")));
        assert!(c.ready_gif_path.is_none());
        assert_eq!(c.fonts["menu_font"].size, DEFAULT_FONT_SIZE);
        assert_eq!(c.fonts["clock"].size, 34.0);
        // Untouched keys keep their defaults.
        assert_eq!(c.icon_size, 35);
    }

    #[test]
    fn font_without_path_keeps_the_rest_of_the_config() {
        let c = DisplayConfig::from_toml_str(
            r#"
            icon_dir = "/x"
            ready_gif_path = "/tmp/ready.gif"

            [fonts.menu_font]
            size = 12
            "#,
        )
        .unwrap();

        assert_eq!(c.icon_dir, PathBuf::from("/x"));
        assert_eq!(c.ready_gif_path, Some(PathBuf::from("/tmp/ready.gif")));
        assert_eq!(c.fonts["menu_font"].path, None);
        assert_eq!(c.fonts["menu_font"].size, 12.0);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let c = DisplayConfig::from_toml_str("screensaver = \"geo\"\n").unwrap();
        assert_eq!(c, DisplayConfig::default());
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let err = DisplayConfig::from_toml_str("icon_size = \"big\"\n").unwrap_err();
        assert!(matches!(err, OledError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = DisplayConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(c, DisplayConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "logo_duration_secs = 6.0\n").unwrap();
        let c = DisplayConfig::load(&path).unwrap();
        assert_eq!(c.logo_duration(), Duration::from_secs(6));
    }

    #[test]
    fn negative_logo_duration_is_zero() {
        let c = DisplayConfig {
            logo_duration_secs: -1.0,
            ..DisplayConfig::default()
        };
        assert_eq!(c.logo_duration(), Duration::ZERO);
    }
}

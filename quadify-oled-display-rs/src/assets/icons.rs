//! Service icon cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::Rgb;
use log::{debug, info, warn};

use super::ICON_SIZE;
use crate::error::OledError;
use crate::raster::{flatten_alpha, resize_exact, RasterImage};

/// Name of the icon used in place of any icon that fails to load.
pub const DEFAULT_ICON_NAME: &str = "default";

/// Colour of the synthesised placeholder used when even the default icon
/// is missing.
pub const PLACEHOLDER_GREY: Rgb<u8> = Rgb([128, 128, 128]);

/// A solid grey square icon.
pub fn placeholder_icon(size: u32) -> RasterImage {
    RasterImage::from_pixel(size, size, PLACEHOLDER_GREY)
}

/// Immutable mapping from service name to its icon.
///
/// Every name passed at construction maps to a valid square RGB icon of
/// [`icon_size`](Self::icon_size) pixels. Lookups of names that were never
/// configured return the shared fallback.
#[derive(Debug, Clone)]
pub struct IconSet {
    icons: HashMap<String, RasterImage>,
    fallback: RasterImage,
    size: u32,
}

impl IconSet {
    /// Load `<dir>/<name>.png` for each name at the standard 35×35 size.
    pub fn load<S: AsRef<str>>(dir: &Path, names: &[S]) -> Self {
        Self::load_sized(dir, names, ICON_SIZE)
    }

    /// Load `<dir>/<name>.png` for each name, scaled to `size`×`size`.
    ///
    /// The fallback is loaded first from `<dir>/default.png`; if that fails
    /// a grey placeholder is synthesised. Any icon that fails to load is
    /// replaced by a copy of the fallback.
    pub fn load_sized<S: AsRef<str>>(dir: &Path, names: &[S], size: u32) -> Self {
        let default_path = icon_path(dir, DEFAULT_ICON_NAME);
        let fallback = match load_icon(&default_path, size) {
            Ok(icon) => {
                info!("Loaded default icon from '{}'.", default_path.display());
                icon
            }
            Err(e) => {
                warn!(
                    "Default icon not found ({}). Creating grey placeholder.",
                    e
                );
                placeholder_icon(size)
            }
        };

        let mut icons = HashMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if name == DEFAULT_ICON_NAME {
                icons.insert(name.to_string(), fallback.clone());
                continue;
            }

            let path = icon_path(dir, name);
            let icon = match load_icon(&path, size) {
                Ok(icon) => {
                    info!("Loaded icon for '{}' from '{}'.", name, path.display());
                    icon
                }
                Err(e) => {
                    warn!(
                        "Icon for '{}' not found at '{}' ({}), using default icon.",
                        name,
                        path.display(),
                        e
                    );
                    fallback.clone()
                }
            };
            icons.insert(name.to_string(), icon);
        }

        Self {
            icons,
            fallback,
            size,
        }
    }

    /// The icon for `name`, or the fallback if `name` is not cached.
    pub fn get(&self, name: &str) -> &RasterImage {
        self.icons.get(name).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &RasterImage {
        &self.fallback
    }

    pub fn contains(&self, name: &str) -> bool {
        self.icons.contains_key(name)
    }

    /// Cached service names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.icons.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn icon_size(&self) -> u32 {
        self.size
    }
}

/// Build an [`IconSet`] from `<dir>/<name>.png` files.
///
/// See [`IconSet::load`].
pub fn load_icons<S: AsRef<str>>(dir: &Path, names: &[S]) -> IconSet {
    IconSet::load(dir, names)
}

fn icon_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.png", name))
}

fn load_icon(path: &Path, size: u32) -> Result<RasterImage, OledError> {
    let image = image::open(path)?;
    if image.color().has_alpha() {
        debug!("Flattening transparency of '{}'.", path.display());
    }
    let flat = flatten_alpha(&image);
    Ok(resize_exact(&flat, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::fs;

    fn write_rgb_png(dir: &Path, name: &str, colour: [u8; 3], w: u32, h: u32) {
        RasterImage::from_pixel(w, h, Rgb(colour))
            .save(icon_path(dir, name))
            .unwrap();
    }

    #[test]
    fn every_configured_name_is_present() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_png(dir.path(), "stream", [255, 0, 0], 64, 64);
        write_rgb_png(dir.path(), "default", [0, 0, 255], 40, 40);

        let names = ["stream", "library", "qobuz", "default"];
        let icons = load_icons(dir.path(), &names);

        assert_eq!(icons.len(), names.len());
        for name in names {
            assert!(icons.contains(name), "missing {}", name);
        }
        let mut loaded: Vec<&str> = icons.names().collect();
        loaded.sort_unstable();
        assert_eq!(loaded, ["default", "library", "qobuz", "stream"]);
    }

    #[test]
    fn missing_icons_equal_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_png(dir.path(), "default", [0, 0, 255], 70, 70);

        let icons = load_icons(dir.path(), &["library", "usb"]);

        assert_eq!(icons.get("library"), icons.fallback());
        assert_eq!(icons.get("usb"), icons.fallback());
        assert_eq!(icons.fallback().get_pixel(17, 17), &Rgb([0, 0, 255]));
    }

    #[test]
    fn corrupt_icon_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(icon_path(dir.path(), "tidal"), b"not a png").unwrap();

        let icons = load_icons(dir.path(), &["tidal"]);

        assert_eq!(icons.get("tidal"), &placeholder_icon(ICON_SIZE));
    }

    #[test]
    fn missing_default_synthesises_grey_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let icons = load_icons(dir.path(), &["stream", "default"]);

        let placeholder = placeholder_icon(ICON_SIZE);
        assert_eq!(icons.fallback(), &placeholder);
        assert_eq!(icons.get("stream"), &placeholder);
        assert_eq!(icons.get("default"), &placeholder);
        assert!(icons.fallback().pixels().all(|p| *p == PLACEHOLDER_GREY));
    }

    #[test]
    fn unknown_lookup_returns_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let icons = load_icons(dir.path(), &["stream"]);
        assert!(!icons.contains("spotify"));
        assert_eq!(icons.get("spotify"), icons.fallback());
    }

    #[test]
    fn icons_are_35px_rgb_even_with_alpha_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut rgba = RgbaImage::from_pixel(120, 90, Rgba([255, 255, 255, 0]));
        for x in 0..120 {
            for y in 0..45 {
                rgba.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        rgba.save(icon_path(dir.path(), "airplay")).unwrap();
        write_rgb_png(dir.path(), "mpd", [10, 200, 10], 12, 300);

        let icons = load_icons(dir.path(), &["airplay", "mpd", "nas"]);

        for name in ["airplay", "mpd", "nas"] {
            assert_eq!(icons.get(name).dimensions(), (ICON_SIZE, ICON_SIZE));
        }
        assert_eq!(icons.fallback().dimensions(), (ICON_SIZE, ICON_SIZE));

        // Transparent half is flattened to black, opaque half stays white.
        let airplay = icons.get("airplay");
        assert_eq!(airplay.get_pixel(17, 2), &Rgb([255, 255, 255]));
        assert_eq!(airplay.get_pixel(17, 32), &Rgb([0, 0, 0]));
    }

    #[test]
    fn custom_icon_size_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_png(dir.path(), "volume", [1, 2, 3], 64, 64);
        let icons = IconSet::load_sized(dir.path(), &["volume", "back"], 16);
        assert_eq!(icons.icon_size(), 16);
        assert_eq!(icons.get("volume").dimensions(), (16, 16));
        assert_eq!(icons.get("back").dimensions(), (16, 16));
    }
}

//! The display service: frame composition on top of the blit sink.
//!
//! [`DisplayService`] owns the asset caches, the mode observers and the
//! [`BlitSink`]. Every public drawing operation builds its canvas and blits
//! it while holding the sink's lock, so frames from different threads are
//! never interleaved.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
//! use quadify_oled_display_rs::{ColorMode, DisplayConfig, DisplayService, MemorySink};
//!
//! let sink = MemorySink::new(256, 64, ColorMode::Luma);
//! let display = DisplayService::new(sink, DisplayConfig::default());
//!
//! display.display_text("Volumio", Point::new(90, 26), "menu_font", Rgb888::WHITE).ok();
//! display.show_logo(Duration::from_secs(5)).ok();
//! display.clear().ok();
//! ```

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use log::{debug, error, info};

use crate::assets::{FontSet, IconSet};
use crate::blit::{BlitSink, Generation};
use crate::config::DisplayConfig;
use crate::driver::DisplaySink;
use crate::error::OledError;
use crate::observer::{CallbackError, ModeObservers};
use crate::raster::{blank_canvas, fit_canvas, flatten_alpha, resize_exact, Canvas, RasterImage};
use crate::signal::StopSignal;

pub(crate) struct Shared<S> {
    pub(crate) sink: BlitSink<S>,
    pub(crate) icons: IconSet,
    pub(crate) fonts: FontSet,
    pub(crate) config: DisplayConfig,
    pub(crate) observers: ModeObservers,
}

// ── DisplayService ───────────────────────────────────────────────────────

/// Frame-blit service for a single display target.
///
/// Cheap to clone; clones share the same sink, caches and observers.
pub struct DisplayService<S> {
    pub(crate) shared: Arc<Shared<S>>,
}

impl<S> Clone for DisplayService<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: DisplaySink + 'static> DisplayService<S> {
    /// Build the service, loading icons and fonts named by `config`.
    ///
    /// Never fails: missing assets are replaced by fallbacks.
    pub fn new(sink: S, config: DisplayConfig) -> Self {
        let icons = IconSet::load_sized(&config.icon_dir, &config.services, config.icon_size);
        let fonts = FontSet::load(&config.fonts);
        Self::with_assets(sink, config, icons, fonts)
    }

    /// Build the service from already loaded caches.
    pub fn with_assets(sink: S, config: DisplayConfig, icons: IconSet, fonts: FontSet) -> Self {
        let sink = BlitSink::new(sink);
        let (width, height) = sink.size();
        info!(
            "DisplayService initialised ({}x{}, {:?}, {} icons, {} fonts).",
            width,
            height,
            sink.mode(),
            icons.len(),
            fonts.len()
        );
        Self {
            shared: Arc::new(Shared {
                sink,
                icons,
                fonts,
                config,
                observers: ModeObservers::new(),
            }),
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.shared.config
    }

    pub fn icons(&self) -> &IconSet {
        &self.shared.icons
    }

    pub fn fonts(&self) -> &FontSet {
        &self.shared.fonts
    }

    /// The serialised path to the display.
    pub fn sink(&self) -> &BlitSink<S> {
        &self.shared.sink
    }

    pub fn size(&self) -> (u32, u32) {
        self.shared.sink.size()
    }

    // ── Mode observers ───────────────────────────────────────────────

    /// Register a callback invoked on every mode change.
    pub fn register_mode_callback<F>(&self, callback: F)
    where
        F: Fn(&str) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.shared.observers.register(callback);
    }

    /// Invoke every registered callback with `mode`.
    ///
    /// Returns the number of callbacks that failed.
    pub fn notify_mode_change(&self, mode: &str) -> usize {
        self.shared.observers.notify(mode)
    }

    // ── Composition ──────────────────────────────────────────────────

    /// Blank the display.
    pub fn clear(&self) -> Result<(), OledError> {
        self.shared.sink.clear()?;
        info!("Screen cleared.");
        Ok(())
    }

    /// Show an image file full screen.
    ///
    /// Transparency is flattened over black. With `resize` the image is
    /// scaled to the display size; otherwise it is placed at the top-left
    /// corner and cropped. If `timeout` is given the screen is cleared after
    /// that long, unless another frame has been shown in the meantime.
    ///
    /// # Errors
    ///
    /// If the file cannot be loaded the error is logged and returned, and
    /// the display keeps its previous content.
    pub fn display_image(
        &self,
        path: &Path,
        resize: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<ScheduledClear>, OledError> {
        let shown = self
            .shared
            .sink
            .compose(|(width, height)| {
                let image = image::open(path)?;
                let flat = flatten_alpha(&image);
                Ok(if resize {
                    resize_exact(&flat, width, height)
                } else {
                    fit_canvas(&flat, width, height)
                })
            })
            .map_err(|e| {
                error!("Failed to load image '{}': {}", path.display(), e);
                e
            })?;
        info!("Displayed image from '{}'.", path.display());

        match timeout {
            Some(after) => {
                let timer = self.schedule_clear_for(shown, after)?;
                info!(
                    "Set timeout to clear screen after {:.1} seconds.",
                    after.as_secs_f32()
                );
                Ok(Some(timer))
            }
            None => Ok(None),
        }
    }

    /// Show `text` with its top-left corner at `position`.
    ///
    /// Unknown `font_key`s fall back to the built-in font.
    pub fn display_text(
        &self,
        text: &str,
        position: Point,
        font_key: &str,
        fill: Rgb888,
    ) -> Result<(), OledError> {
        let font = self.shared.fonts.get(font_key);
        self.shared.sink.compose(|(width, height)| {
            let mut raster = blank_canvas(width, height);
            font.draw_text(&mut raster, text, position, fill);
            Ok(raster)
        })?;
        info!(
            "Displayed text '{}' at ({}, {}) with font '{}'.",
            text, position.x, position.y, font_key
        );
        Ok(())
    }

    /// Show the cached icon for `name` (or the fallback) at `position`.
    pub fn display_icon(&self, name: &str, position: Point) -> Result<(), OledError> {
        let icon = self.shared.icons.get(name);
        self.shared.sink.compose(|(width, height)| {
            let mut raster = blank_canvas(width, height);
            Canvas::new(&mut raster).paste(icon, position);
            Ok(raster)
        })?;
        debug!("Displayed icon '{}'.", name);
        Ok(())
    }

    /// Run `draw` against a blank canvas and show the result.
    ///
    /// `draw` runs with the display lock held and must not call back into
    /// this service.
    pub fn draw_custom<F>(&self, draw: F) -> Result<(), OledError>
    where
        F: FnOnce(&mut Canvas<'_>),
    {
        self.shared.sink.compose(|(width, height)| {
            let mut raster = blank_canvas(width, height);
            draw(&mut Canvas::new(&mut raster));
            Ok(raster)
        })?;
        debug!("Executed custom draw function.");
        Ok(())
    }

    /// Show a raster that was rendered elsewhere.
    ///
    /// Rasters of another size are scaled to the display.
    pub fn display_raster(&self, raster: &RasterImage) -> Result<(), OledError> {
        self.shared
            .sink
            .compose(|(width, height)| Ok(resize_exact(raster, width, height)))?;
        Ok(())
    }

    // ── Deferred clear ───────────────────────────────────────────────

    /// Clear the screen after `after`, unless another frame is shown first.
    pub fn schedule_clear(&self, after: Duration) -> Result<ScheduledClear, OledError> {
        let current = self.shared.sink.generation();
        self.schedule_clear_for(current, after)
    }

    fn schedule_clear_for(
        &self,
        generation: Generation,
        after: Duration,
    ) -> Result<ScheduledClear, OledError> {
        let cancel = StopSignal::new();
        let cancelled = cancel.clone();
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name("oled-auto-clear".into())
            .spawn(move || {
                if cancelled.wait_timeout(after) {
                    debug!("Auto-clear cancelled.");
                    return false;
                }
                match shared.sink.clear_if_current(generation) {
                    Ok(true) => {
                        info!("Screen cleared after timeout.");
                        true
                    }
                    Ok(false) => {
                        debug!("Auto-clear skipped: newer content on screen.");
                        false
                    }
                    Err(e) => {
                        error!("Auto-clear failed: {}", e);
                        false
                    }
                }
            })?;

        Ok(ScheduledClear {
            cancel,
            handle: Some(handle),
        })
    }
}

// ── ScheduledClear ───────────────────────────────────────────────────────

/// Handle to a pending auto-clear.
///
/// Dropping the handle leaves the timer running.
#[derive(Debug)]
pub struct ScheduledClear {
    cancel: StopSignal,
    handle: Option<JoinHandle<bool>>,
}

impl ScheduledClear {
    /// Stop the timer if it has not fired yet.
    pub fn cancel(&self) {
        self.cancel.set();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the timer has fired or been cancelled.
    ///
    /// Returns `true` if it cleared the screen.
    pub fn wait(mut self) -> bool {
        self.handle
            .take()
            .map(|h| h.join().unwrap_or(false))
            .unwrap_or(false)
    }
}

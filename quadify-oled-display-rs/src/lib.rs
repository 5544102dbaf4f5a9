//! Frame-blit service for the Quadify OLED panel.
//!
//! This crate provides [`DisplayService`], the single owner of the display
//! hardware. It caches service icons and fonts at startup, composes full
//! frames (images, text, icons, custom drawings), plays timed animations
//! and serialises every transmission through one lock, so concurrent
//! callers can never produce a torn frame.
//!
//! The appliance panel is a 256×64 greyscale OLED (SSD1322 class), and
//! `quadify-oled --headless` renders into a [`MemorySink`] of the same
//! 256×64 luma geometry. [`Ssd1306Sink`] is the bundled hardware driver,
//! for smaller 128×64 monochrome panels. Everything above the sink is
//! geometry-agnostic.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use linux_embedded_hal::I2cdev;
//! use quadify_oled_display_rs::{DisplayConfig, DisplayService, Ssd1306Sink, StopSignal};
//!
//! let i2c = I2cdev::new("/dev/i2c-1")?;
//! let mut panel = Ssd1306Sink::new(i2c, 0x3C);
//! panel.init()?;
//!
//! let config = DisplayConfig::load_or_default("/etc/quadify/display.toml".as_ref());
//! let display = DisplayService::new(panel, config);
//!
//! display.show_logo(display.config().logo_duration())?;
//!
//! let stop = StopSignal::new();
//! // Hand `stop.clone()` to whatever detects the player becoming ready.
//! display.show_ready_gif_until_event(&stop)?;
//! ```
//!
//! # Crate Features
//!
//! - **`ssd1306`** *(default)*: [`Ssd1306Sink`], an SSD1306 128×64 target
//!   over any blocking `embedded-hal` I2C bus.

pub mod animation;
pub mod assets;
pub mod blit;
pub mod composer;
pub mod config;
pub mod driver;
pub mod error;
pub mod observer;
pub mod raster;
pub mod signal;

// ── Re-exports for convenience ───────────────────────────────────────────

pub use animation::{AnimationFrame, AnimationSequence, PlaybackEnd, PlaybackReport};
pub use assets::{load_fonts, load_icons, FontHandle, FontSet, IconSet};
pub use blit::BlitSink;
pub use composer::{DisplayService, ScheduledClear};
pub use config::{DisplayConfig, FontSpec};
#[cfg(feature = "ssd1306")]
pub use driver::Ssd1306Sink;
pub use driver::{DisplaySink, MemorySink};
pub use error::OledError;
pub use observer::ModeObservers;
pub use raster::{Canvas, ColorMode, Frame, RasterImage};
pub use signal::StopSignal;

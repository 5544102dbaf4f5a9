//! Display targets.
//!
//! [`DisplaySink`] is the narrow contract the service needs from the
//! hardware: fixed geometry, a native [`ColorMode`] and a way to push one
//! full frame. Two targets ship with the crate:
//!
//! - [`MemorySink`] keeps frames in memory (headless runs and tests). The
//!   headless binary sizes it like the 256×64 greyscale appliance panel.
//! - [`Ssd1306Sink`] drives an SSD1306 128×64 panel over any blocking
//!   `embedded-hal` I2C bus (feature `ssd1306`, on by default).

use crate::error::OledError;
use crate::raster::{ColorMode, Frame};

// ── DisplaySink ──────────────────────────────────────────────────────────

/// A fixed-size raster sink.
///
/// Implementations only transmit; mode conversion and locking are done by
/// [`BlitSink`](crate::blit::BlitSink) before [`display`](Self::display) is
/// called, so every frame received already has the sink's size and mode.
pub trait DisplaySink: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Native pixel format frames must be converted to.
    fn mode(&self) -> ColorMode;

    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Push one full frame to the panel. Blocks until transmission ends.
    fn display(&mut self, frame: &Frame) -> Result<(), OledError>;
}

fn check_size(expected: (u32, u32), frame: &Frame) -> Result<(), OledError> {
    if frame.size() == expected {
        Ok(())
    } else {
        Err(OledError::FrameSize {
            expected,
            actual: frame.size(),
        })
    }
}

// ── MemorySink ───────────────────────────────────────────────────────────

/// In-memory display target.
///
/// Remembers the last frame and counts blits. A recording sink also keeps
/// every frame in order.
#[derive(Debug, Clone)]
pub struct MemorySink {
    width: u32,
    height: u32,
    mode: ColorMode,
    last: Option<Frame>,
    blits: usize,
    history: Option<Vec<Frame>>,
}

impl MemorySink {
    pub fn new(width: u32, height: u32, mode: ColorMode) -> Self {
        Self {
            width,
            height,
            mode,
            last: None,
            blits: 0,
            history: None,
        }
    }

    /// A sink that additionally keeps every frame it receives.
    pub fn recording(width: u32, height: u32, mode: ColorMode) -> Self {
        Self {
            history: Some(Vec::new()),
            ..Self::new(width, height, mode)
        }
    }

    /// The most recently displayed frame, if any.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    /// Number of frames displayed so far.
    pub fn blit_count(&self) -> usize {
        self.blits
    }

    /// Every displayed frame, oldest first. Empty unless recording.
    pub fn history(&self) -> &[Frame] {
        self.history.as_deref().unwrap_or(&[])
    }
}

impl DisplaySink for MemorySink {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn mode(&self) -> ColorMode {
        self.mode
    }

    fn display(&mut self, frame: &Frame) -> Result<(), OledError> {
        check_size(self.size(), frame)?;
        if let Some(history) = self.history.as_mut() {
            history.push(frame.clone());
        }
        self.last = Some(frame.clone());
        self.blits += 1;
        Ok(())
    }
}

// ── Ssd1306Sink ──────────────────────────────────────────────────────────

#[cfg(feature = "ssd1306")]
pub use self::ssd1306_sink::Ssd1306Sink;

#[cfg(feature = "ssd1306")]
mod ssd1306_sink {
    use display_interface_i2c::I2CInterface;
    use embedded_hal::i2c::I2c;
    use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};

    use super::{check_size, DisplaySink};
    use crate::error::OledError;
    use crate::raster::{ColorMode, Frame};

    /// Concrete display type used internally by [`Ssd1306Sink`].
    type Display<I2C> =
        Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

    /// SSD1306 128×64 monochrome OLED over I2C.
    ///
    /// Wraps the [`ssd1306`] crate in buffered graphics mode. Frames are
    /// [`ColorMode::Binary`]; each lit byte sets one pixel in the frame
    /// buffer, which is then flushed in a single transfer.
    ///
    /// # Lifecycle
    ///
    /// 1. [`Ssd1306Sink::new()`]: constructs the sink without any I2C traffic.
    /// 2. [`Ssd1306Sink::init()`]: sends the SSD1306 initialisation sequence.
    /// 3. [`DisplaySink::display()`]: fills the frame buffer and flushes it.
    pub struct Ssd1306Sink<I2C> {
        display: Display<I2C>,
        initialized: bool,
    }

    impl<I2C> Ssd1306Sink<I2C>
    where
        I2C: I2c,
    {
        pub const WIDTH: u32 = 128;
        pub const HEIGHT: u32 = 64;

        /// Construct an uninitialised sink.
        ///
        /// No I2C traffic is generated. You **must** call
        /// [`init()`](Self::init) before displaying frames.
        ///
        /// # Arguments
        /// * `i2c`: an already opened I2C bus (takes ownership).
        /// * `address`: 7-bit I2C device address (typically `0x3C` or `0x3D`).
        pub fn new(i2c: I2C, address: u8) -> Self {
            let interface = I2CDisplayInterface::new_custom_address(i2c, address);
            let display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            Self {
                display,
                initialized: false,
            }
        }

        /// Initialise the SSD1306 hardware.
        ///
        /// # Errors
        ///
        /// Returns [`OledError::InitializationFailed`] if the panel does not
        /// respond.
        pub fn init(&mut self) -> Result<(), OledError> {
            self.display
                .init()
                .map_err(|_| OledError::InitializationFailed)?;
            self.initialized = true;
            Ok(())
        }

        pub fn is_initialized(&self) -> bool {
            self.initialized
        }
    }

    impl<I2C> DisplaySink for Ssd1306Sink<I2C>
    where
        I2C: I2c + Send,
    {
        fn width(&self) -> u32 {
            Self::WIDTH
        }

        fn height(&self) -> u32 {
            Self::HEIGHT
        }

        fn mode(&self) -> ColorMode {
            ColorMode::Binary
        }

        fn display(&mut self, frame: &Frame) -> Result<(), OledError> {
            if !self.initialized {
                return Err(OledError::NotInitialized);
            }
            check_size(self.size(), frame)?;

            self.display.clear_buffer();
            for y in 0..Self::HEIGHT {
                for x in 0..Self::WIDTH {
                    let lit = frame.brightness(x, y).unwrap_or(0) != 0;
                    if lit {
                        self.display.set_pixel(x, y, true);
                    }
                }
            }
            self.display.flush()?;
            Ok(())
        }
    }
}

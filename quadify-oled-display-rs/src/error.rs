//! Error types for the OLED display service.

use std::fmt;
use std::io;

#[cfg(feature = "ssd1306")]
use display_interface::DisplayError;

/// Errors that can occur while loading assets or pushing frames to the
/// display.
///
/// Missing icons and fonts never surface here: the asset cache substitutes
/// fallbacks and logs a warning instead. What does surface is a failure to
/// load an image the caller explicitly asked for, or a failure of the
/// hardware sink itself.
#[derive(Debug)]
pub enum OledError {
    /// Filesystem error while reading an asset or configuration file.
    Io(io::Error),
    /// The image could not be decoded (unsupported or corrupt file).
    Image(image::ImageError),
    /// The font file is not a valid TrueType/OpenType font.
    Font(ab_glyph::InvalidFont),
    /// The configuration file could not be parsed.
    Config(toml::de::Error),
    /// Display interface error (wraps I2C and other bus-level failures).
    #[cfg(feature = "ssd1306")]
    Display(DisplayError),
    /// Display hardware did not respond to initialisation.
    InitializationFailed,
    /// A frame was pushed before the sink was initialised.
    NotInitialized,
    /// A frame does not match the dimensions of the display target.
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// An animation source decoded to zero frames.
    EmptyAnimation,
    /// A required asset path is not configured.
    MissingAsset(&'static str),
}

impl fmt::Display for OledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OledError::Io(e) => write!(f, "I/O error: {}", e),
            OledError::Image(e) => write!(f, "image error: {}", e),
            OledError::Font(e) => write!(f, "font error: {}", e),
            OledError::Config(e) => write!(f, "configuration error: {}", e),
            #[cfg(feature = "ssd1306")]
            OledError::Display(e) => write!(f, "display interface error: {:?}", e),
            OledError::InitializationFailed => write!(f, "display initialisation failed"),
            OledError::NotInitialized => write!(f, "display not initialised"),
            OledError::FrameSize { expected, actual } => write!(
                f,
                "frame is {}x{}, display expects {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            OledError::EmptyAnimation => write!(f, "animation contains no frames"),
            OledError::MissingAsset(what) => write!(f, "no {} configured", what),
        }
    }
}

impl std::error::Error for OledError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OledError::Io(e) => Some(e),
            OledError::Image(e) => Some(e),
            OledError::Font(e) => Some(e),
            OledError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OledError {
    fn from(e: io::Error) -> Self {
        OledError::Io(e)
    }
}

impl From<image::ImageError> for OledError {
    fn from(e: image::ImageError) -> Self {
        OledError::Image(e)
    }
}

impl From<ab_glyph::InvalidFont> for OledError {
    fn from(e: ab_glyph::InvalidFont) -> Self {
        OledError::Font(e)
    }
}

impl From<toml::de::Error> for OledError {
    fn from(e: toml::de::Error) -> Self {
        OledError::Config(e)
    }
}

#[cfg(feature = "ssd1306")]
impl From<DisplayError> for OledError {
    fn from(e: DisplayError) -> Self {
        OledError::Display(e)
    }
}

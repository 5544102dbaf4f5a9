//! quadify-oled
//!
//! Command-line front end for the Quadify OLED panel. Wires the display
//! library to real hardware (or to an in-memory panel) and runs one display
//! operation per invocation:
//!
//! 1. The configuration file is read (missing or invalid files fall back to
//!    the appliance defaults).
//! 2. The panel is opened: an SSD1306 on the given I2C bus, or a 256×64
//!    greyscale memory panel with `--headless`.
//! 3. The display service caches icons and fonts, the mode observers are
//!    notified with the subcommand name, and the operation runs to
//!    completion.
//! 4. In headless mode the last frame can be written out with `--dump`.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use log::{info, warn};

use quadify_oled_display_rs::raster::blank_canvas;
use quadify_oled_display_rs::{
    Canvas, ColorMode, DisplayConfig, DisplayService, DisplaySink, Frame, MemorySink, OledError,
    PlaybackEnd, RasterImage, StopSignal,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Geometry of the headless panel (matches the appliance's greyscale OLED).
const HEADLESS_WIDTH: u32 = 256;
const HEADLESS_HEIGHT: u32 = 64;

#[derive(Debug, Parser)]
#[command(name = "quadify-oled", version, about = "Drive the Quadify OLED panel")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, default_value = "/etc/quadify/display.toml")]
    config: PathBuf,

    /// I2C bus device the panel is attached to.
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_bus: PathBuf,

    /// 7-bit I2C address of the panel (hex with `0x` prefix, or decimal).
    #[arg(long, default_value = "0x3C", value_parser = parse_address)]
    address: u8,

    /// Render into memory instead of driving hardware.
    #[arg(long)]
    headless: bool,

    /// Write the last frame to this PNG file (headless only).
    #[arg(long, value_name = "PNG", requires = "headless")]
    dump: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the boot logo.
    Logo {
        /// Override the configured logo duration.
        #[arg(long)]
        seconds: Option<f32>,
    },
    /// Loop the ready animation until a line arrives on stdin.
    ///
    /// Closing stdin without a line does not count as ready.
    Ready {
        /// Also stop after this many seconds.
        #[arg(long)]
        seconds: Option<f32>,
    },
    /// Play an animation once.
    Intro { path: PathBuf },
    /// Show a line of text.
    Text {
        text: String,
        #[arg(long, default_value_t = 0)]
        x: i32,
        #[arg(long, default_value_t = 0)]
        y: i32,
        #[arg(long, default_value = "menu_font")]
        font: String,
    },
    /// Show an image full screen.
    Image {
        path: PathBuf,
        /// Place the image at the top-left corner instead of scaling it.
        #[arg(long)]
        no_resize: bool,
        /// Clear the screen after this many seconds.
        #[arg(long)]
        timeout: Option<f32>,
    },
    /// Show a service icon centred on screen.
    Icon { name: String },
    /// Slide from one service icon to another.
    Slide {
        from: String,
        to: String,
        #[arg(long, default_value_t = 0.4)]
        seconds: f32,
        #[arg(long, default_value_t = 30)]
        fps: u32,
    },
    /// Blank the screen.
    Clear,
}

impl Command {
    /// Mode name announced to the observers.
    fn mode(&self) -> &'static str {
        match self {
            Command::Logo { .. } => "logo",
            Command::Ready { .. } => "ready",
            Command::Intro { .. } => "intro",
            Command::Text { .. } => "text",
            Command::Image { .. } => "image",
            Command::Icon { .. } => "icon",
            Command::Slide { .. } => "slide",
            Command::Clear => "clear",
        }
    }
}

fn parse_address(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("{:#04x} is not a 7-bit address", address)),
        Err(e) => Err(e.to_string()),
    }
}

fn seconds(value: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(value).with_context(|| format!("invalid duration: {}", value))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = DisplayConfig::load_or_default(&cli.config);

    if cli.headless {
        let sink = MemorySink::new(HEADLESS_WIDTH, HEADLESS_HEIGHT, ColorMode::Luma);
        let display = DisplayService::new(sink, config);
        run(&display, &cli.command)?;
        if let Some(path) = &cli.dump {
            dump_last_frame(&display, path)?;
        }
        return Ok(());
    }

    run_hardware(&cli, config)
}

#[cfg(target_os = "linux")]
fn run_hardware(cli: &Cli, config: DisplayConfig) -> Result<()> {
    use linux_embedded_hal::I2cdev;
    use quadify_oled_display_rs::Ssd1306Sink;

    let i2c = I2cdev::new(&cli.i2c_bus)
        .with_context(|| format!("failed to open I2C bus {}", cli.i2c_bus.display()))?;
    let mut panel = Ssd1306Sink::new(i2c, cli.address);
    panel
        .init()
        .with_context(|| format!("no SSD1306 at address {:#04x}", cli.address))?;
    info!("SSD1306 initialised on {}.", cli.i2c_bus.display());

    let display = DisplayService::new(panel, config);
    run(&display, &cli.command)
}

#[cfg(not(target_os = "linux"))]
fn run_hardware(_cli: &Cli, _config: DisplayConfig) -> Result<()> {
    anyhow::bail!("hardware mode needs Linux I2C; run with --headless")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run<S: DisplaySink + 'static>(display: &DisplayService<S>, command: &Command) -> Result<()> {
    display.register_mode_callback(|mode| {
        info!("Mode changed to '{}'.", mode);
        Ok(())
    });
    display.notify_mode_change(command.mode());

    match command {
        Command::Logo { seconds: secs } => {
            let duration = match secs {
                Some(s) => seconds(*s)?,
                None => display.config().logo_duration(),
            };
            let report = display.show_logo(duration)?;
            if report.end == PlaybackEnd::Skipped {
                return Err(OledError::MissingAsset("logo_path").into());
            }
            info!("Logo finished: {:?}.", report);
        }
        Command::Ready { seconds: secs } => {
            let stop = StopSignal::new();
            stop_on_stdin(&stop)?;
            if let Some(s) = secs {
                stop_after(&stop, seconds(*s)?)?;
            }
            let report = display.show_ready_gif_until_event(&stop)?;
            if report.end == PlaybackEnd::Skipped {
                return Err(OledError::MissingAsset("ready_gif_path").into());
            }
            info!("Ready animation finished: {:?}.", report);
        }
        Command::Intro { path } => {
            let report = display.play_once(path)?;
            info!("Intro finished: {:?}.", report);
        }
        Command::Text { text, x, y, font } => {
            display.display_text(text, Point::new(*x, *y), font, Rgb888::WHITE)?;
        }
        Command::Image {
            path,
            no_resize,
            timeout,
        } => {
            let timeout = timeout.map(seconds).transpose()?;
            if let Some(timer) = display.display_image(path, !no_resize, timeout)? {
                // Stay alive until the screen has been cleared.
                timer.wait();
            }
        }
        Command::Icon { name } => {
            display.display_raster(&icon_screen(display, name))?;
        }
        Command::Slide {
            from,
            to,
            seconds: secs,
            fps,
        } => {
            let from = icon_screen(display, from);
            let to = icon_screen(display, to);
            let report = display.slide_transition(&from, &to, seconds(*secs)?, *fps)?;
            info!("Slide finished after {} frames.", report.frames);
        }
        Command::Clear => display.clear()?,
    }
    Ok(())
}

/// A full-screen raster with the icon for `name` centred on black.
fn icon_screen<S: DisplaySink + 'static>(display: &DisplayService<S>, name: &str) -> RasterImage {
    let (width, height) = display.size();
    let icon = display.icons().get(name);
    let origin = Point::new(
        (width as i32 - icon.width() as i32) / 2,
        (height as i32 - icon.height() as i32) / 2,
    );
    let mut raster = blank_canvas(width, height);
    Canvas::new(&mut raster).paste(icon, origin);
    raster
}

fn stop_on_stdin(stop: &StopSignal) -> Result<()> {
    let stop = stop.clone();
    thread::Builder::new()
        .name("stdin-stop".into())
        .spawn(move || stop_on_line(std::io::stdin().lock(), &stop))
        .context("failed to spawn stdin watcher")?;
    Ok(())
}

/// Raise `stop` once a line arrives on `reader`.
///
/// A closed or failing input is not a readiness event, so only `--seconds`
/// can end the animation then.
fn stop_on_line<R: BufRead>(mut reader: R, stop: &StopSignal) {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(n) if n > 0 => stop.set(),
        Ok(_) => info!("stdin closed; waiting for the timeout instead."),
        Err(e) => warn!("Failed to read stdin: {}", e),
    }
}

fn stop_after(stop: &StopSignal, after: Duration) -> Result<()> {
    let stop = stop.clone();
    thread::Builder::new()
        .name("ready-timeout".into())
        .spawn(move || {
            thread::sleep(after);
            stop.set();
        })
        .context("failed to spawn ready timer")?;
    Ok(())
}

fn dump_last_frame(display: &DisplayService<MemorySink>, path: &Path) -> Result<()> {
    let image = display
        .sink()
        .with_sink(|sink| sink.last_frame().map(Frame::to_image));
    match image {
        Some(image) => {
            image
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Last frame written to {}.", path.display());
        }
        None => warn!("Nothing was displayed; no frame to dump."),
    }
    Ok(())
}

//! Animated asset playback.
//!
//! Sequences are decoded up front into display-ready RGB frames, each with
//! its own delay. Playback blits one frame at a time through the service's
//! [`BlitSink`](crate::blit::BlitSink), so the display lock is held only for
//! the duration of a single transmission and never across a sleep.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::prelude::*;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use log::{debug, error, info, warn};

use crate::composer::DisplayService;
use crate::driver::DisplaySink;
use crate::error::OledError;
use crate::raster::{blank_canvas, flatten_alpha, resize_exact, Canvas, RasterImage};
use crate::signal::{deadline_after, StopSignal};

/// Delay used for frames whose source gives none (or zero).
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Granularity of the wait after a static ready image.
const STATIC_WAIT_SLICE: Duration = Duration::from_millis(500);

// ── AnimationSequence ────────────────────────────────────────────────────

/// One decoded frame and how long it stays on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    pub image: RasterImage,
    pub delay: Duration,
}

/// A non-empty, ordered list of frames.
///
/// A sequence with a single frame is a static image.
#[derive(Debug, Clone)]
pub struct AnimationSequence {
    frames: Vec<AnimationFrame>,
}

impl AnimationSequence {
    /// Decode a GIF, APNG or still image file.
    ///
    /// Transparency is flattened over black. Zero delays are replaced by
    /// [`DEFAULT_FRAME_DELAY`].
    pub fn open(path: &Path) -> Result<Self, OledError> {
        let frames = match ImageFormat::from_path(path) {
            Ok(ImageFormat::Gif) => {
                let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
                decode_frames(decoder)?
            }
            Ok(ImageFormat::Png) => {
                let decoder = PngDecoder::new(BufReader::new(File::open(path)?))?;
                if decoder.is_apng()? {
                    decode_frames(decoder.apng()?)?
                } else {
                    vec![still_frame(&DynamicImage::from_decoder(decoder)?)]
                }
            }
            _ => vec![still_frame(&image::open(path)?)],
        };
        debug!("Loaded {} frame(s) from '{}'.", frames.len(), path.display());
        Self::from_frames(frames)
    }

    /// # Errors
    ///
    /// Returns [`OledError::EmptyAnimation`] if `frames` is empty.
    pub fn from_frames(frames: Vec<AnimationFrame>) -> Result<Self, OledError> {
        if frames.is_empty() {
            return Err(OledError::EmptyAnimation);
        }
        Ok(Self { frames })
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of all frame delays: the length of one pass.
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }

    /// The same sequence with every frame scaled to `width`×`height`.
    pub fn fitted(self, (width, height): (u32, u32)) -> Self {
        let frames = self
            .frames
            .into_iter()
            .map(|frame| {
                if frame.image.dimensions() == (width, height) {
                    frame
                } else {
                    AnimationFrame {
                        image: resize_exact(&frame.image, width, height),
                        delay: frame.delay,
                    }
                }
            })
            .collect();
        Self { frames }
    }
}

fn decode_frames<'a>(decoder: impl AnimationDecoder<'a>) -> Result<Vec<AnimationFrame>, OledError> {
    let frames = decoder.into_frames().collect_frames()?;
    Ok(frames
        .into_iter()
        .map(|frame| {
            let delay = non_zero(Duration::from(frame.delay()));
            let image = flatten_alpha(&DynamicImage::ImageRgba8(frame.into_buffer()));
            AnimationFrame { image, delay }
        })
        .collect())
}

fn still_frame(image: &DynamicImage) -> AnimationFrame {
    AnimationFrame {
        image: flatten_alpha(image),
        delay: DEFAULT_FRAME_DELAY,
    }
}

/// Time until `deadline`; unbounded when there is none.
fn time_left(deadline: Option<Instant>) -> Duration {
    deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()))
}

fn non_zero(delay: Duration) -> Duration {
    if delay.is_zero() {
        DEFAULT_FRAME_DELAY
    } else {
        delay
    }
}

// ── Playback ─────────────────────────────────────────────────────────────

/// Why a playback call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The requested wall-clock duration elapsed.
    DeadlineReached,
    /// The stop signal was observed.
    Stopped,
    /// Every frame was shown.
    Exhausted,
    /// No asset was configured; nothing was shown.
    Skipped,
}

/// Outcome of a playback call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub end: PlaybackEnd,
    /// Number of frames blitted.
    pub frames: usize,
}

impl PlaybackReport {
    fn new(end: PlaybackEnd, frames: usize) -> Self {
        Self { end, frames }
    }
}

impl<S: DisplaySink + 'static> DisplayService<S> {
    fn load_sequence(&self, path: &Path) -> Result<AnimationSequence, OledError> {
        AnimationSequence::open(path)
            .map(|sequence| sequence.fitted(self.size()))
            .map_err(|e| {
                error!("Failed to load animation '{}': {}", path.display(), e);
                e
            })
    }

    /// Play the configured logo for `duration`.
    ///
    /// An animated logo loops until the deadline; a static one is shown once
    /// and held. Returns after roughly `duration` in both cases.
    pub fn show_logo(&self, duration: Duration) -> Result<PlaybackReport, OledError> {
        let Some(path) = self.config().logo_path.clone() else {
            warn!("No logo path configured.");
            return Ok(PlaybackReport::new(PlaybackEnd::Skipped, 0));
        };
        let sequence = self.load_sequence(&path)?;
        info!(
            "Displaying logo for {:.1} seconds ({} frames).",
            duration.as_secs_f32(),
            sequence.len()
        );

        let deadline = deadline_after(duration);
        let sink = self.sink();

        if !sequence.is_animated() {
            sink.blit(&sequence.frames()[0].image)?;
            thread::sleep(time_left(deadline));
            return Ok(PlaybackReport::new(PlaybackEnd::DeadlineReached, 1));
        }

        let mut shown = 0;
        for frame in sequence.frames().iter().cycle() {
            if time_left(deadline).is_zero() {
                break;
            }
            sink.blit(&frame.image)?;
            shown += 1;
            thread::sleep(frame.delay.min(time_left(deadline)));
        }
        info!("Logo display finished after {} frames.", shown);
        Ok(PlaybackReport::new(PlaybackEnd::DeadlineReached, shown))
    }

    /// Loop the configured ready animation until `stop` is set.
    ///
    /// The signal is checked before every frame and the per-frame delay is
    /// an interruptible wait on it. The last frame stays on screen.
    pub fn show_ready_gif_until_event(
        &self,
        stop: &StopSignal,
    ) -> Result<PlaybackReport, OledError> {
        let Some(path) = self.config().ready_gif_path.clone() else {
            warn!("No ready GIF path configured.");
            return Ok(PlaybackReport::new(PlaybackEnd::Skipped, 0));
        };
        let sequence = self.load_sequence(&path)?;
        info!("Displaying ready animation until stopped.");

        let sink = self.sink();
        let mut shown = 0;

        if !sequence.is_animated() {
            if !stop.is_set() {
                sink.blit(&sequence.frames()[0].image)?;
                shown = 1;
                while !stop.wait_timeout(STATIC_WAIT_SLICE) {}
            }
            info!("Ready animation stopped.");
            return Ok(PlaybackReport::new(PlaybackEnd::Stopped, shown));
        }

        for frame in sequence.frames().iter().cycle() {
            if stop.is_set() {
                break;
            }
            sink.blit(&frame.image)?;
            shown += 1;
            if stop.wait_timeout(frame.delay) {
                break;
            }
        }
        info!("Ready animation stopped after {} frames.", shown);
        Ok(PlaybackReport::new(PlaybackEnd::Stopped, shown))
    }

    /// Play every frame of the sequence at `path` once.
    pub fn play_once(&self, path: &Path) -> Result<PlaybackReport, OledError> {
        let sequence = self.load_sequence(path)?;
        info!(
            "Playing '{}' once ({} frames).",
            path.display(),
            sequence.len()
        );
        let sink = self.sink();
        for frame in sequence.frames() {
            sink.blit(&frame.image)?;
            thread::sleep(frame.delay);
        }
        Ok(PlaybackReport::new(PlaybackEnd::Exhausted, sequence.len()))
    }

    /// Slide `from` out to the left while `to` enters from the right.
    ///
    /// Runs `max(1, duration * fps)` steps spread evenly over `duration`.
    /// Rasters of another size are scaled to the display first.
    pub fn slide_transition(
        &self,
        from: &RasterImage,
        to: &RasterImage,
        duration: Duration,
        fps: u32,
    ) -> Result<PlaybackReport, OledError> {
        let (width, height) = self.size();
        let fit = |raster: &RasterImage| {
            if raster.dimensions() == (width, height) {
                raster.clone()
            } else {
                resize_exact(raster, width, height)
            }
        };
        let (from, to) = (fit(from), fit(to));

        let steps = ((duration.as_secs_f64() * fps as f64).round() as u32).max(1);
        let budget = duration / steps;
        debug!("Slide transition: {} steps of {:?}.", steps, budget);

        for step in 1..=steps {
            let started = Instant::now();
            let offset = (width as u64 * step as u64 / steps as u64) as i32;
            self.sink().compose(|(w, h)| {
                let mut raster = blank_canvas(w, h);
                let mut canvas = Canvas::new(&mut raster);
                canvas.paste(&from, Point::new(-offset, 0));
                canvas.paste(&to, Point::new(w as i32 - offset, 0));
                Ok(raster)
            })?;
            thread::sleep(budget.saturating_sub(started.elapsed()));
        }
        Ok(PlaybackReport::new(PlaybackEnd::Exhausted, steps as usize))
    }
}

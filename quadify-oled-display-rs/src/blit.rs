//! Serialised access to the display target.
//!
//! [`BlitSink`] owns the [`DisplaySink`] behind a single mutex. Every frame,
//! from canvas construction through hardware transmission, is produced with
//! that mutex held, so two callers can never interleave pixels of their
//! frames. The mutex is not reentrant: a draw procedure running inside
//! [`BlitSink::compose`] must not call back into the sink.

use parking_lot::Mutex;

use crate::driver::DisplaySink;
use crate::error::OledError;
use crate::raster::{blank_canvas, ColorMode, Frame, RasterImage};

/// Sequence number of a transmitted frame.
///
/// Incremented on every successful blit. Used to tell whether a deferred
/// action still refers to the frame currently on screen.
pub type Generation = u64;

struct Target<S> {
    sink: S,
    generation: Generation,
}

impl<S: DisplaySink> Target<S> {
    fn transmit(&mut self, frame: &Frame) -> Result<Generation, OledError> {
        self.sink.display(frame)?;
        self.generation += 1;
        Ok(self.generation)
    }

    fn transmit_raster(&mut self, raster: &RasterImage) -> Result<Generation, OledError> {
        let expected = self.sink.size();
        if raster.dimensions() != expected {
            return Err(OledError::FrameSize {
                expected,
                actual: raster.dimensions(),
            });
        }
        let frame = Frame::from_rgb(raster, self.sink.mode());
        self.transmit(&frame)
    }
}

/// The single, mutex-guarded path to the display.
pub struct BlitSink<S> {
    target: Mutex<Target<S>>,
    width: u32,
    height: u32,
    mode: ColorMode,
}

impl<S: DisplaySink> BlitSink<S> {
    pub fn new(sink: S) -> Self {
        let (width, height) = sink.size();
        let mode = sink.mode();
        Self {
            target: Mutex::new(Target {
                sink,
                generation: 0,
            }),
            width,
            height,
            mode,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Build a frame and transmit it, holding the lock throughout.
    ///
    /// `build` receives the target size and returns an RGB raster of exactly
    /// that size. If it fails nothing is transmitted and the display keeps
    /// its previous content.
    ///
    /// Returns the [`Generation`] of the transmitted frame.
    pub fn compose<F>(&self, build: F) -> Result<Generation, OledError>
    where
        F: FnOnce((u32, u32)) -> Result<RasterImage, OledError>,
    {
        let mut target = self.target.lock();
        let raster = build(self.size())?;
        target.transmit_raster(&raster)
    }

    /// Convert `raster` to the native mode and transmit it.
    ///
    /// # Errors
    ///
    /// Returns [`OledError::FrameSize`] if `raster` does not match the
    /// target dimensions, or whatever the sink reports.
    pub fn blit(&self, raster: &RasterImage) -> Result<Generation, OledError> {
        self.target.lock().transmit_raster(raster)
    }

    /// Transmit an already converted frame.
    ///
    /// A frame in another mode than the target's is converted through RGB.
    pub fn blit_frame(&self, frame: &Frame) -> Result<Generation, OledError> {
        let mut target = self.target.lock();
        if frame.mode() == self.mode {
            target.transmit(frame)
        } else {
            target.transmit_raster(&frame.to_image().to_rgb8())
        }
    }

    /// Blit a solid black frame.
    pub fn clear(&self) -> Result<Generation, OledError> {
        self.target
            .lock()
            .transmit(&Frame::black(self.width, self.height, self.mode))
    }

    /// Blit a solid black frame only if `generation` is still the frame on
    /// screen.
    ///
    /// Returns `Ok(true)` if the display was cleared, `Ok(false)` if a newer
    /// frame has been blitted since.
    pub fn clear_if_current(&self, generation: Generation) -> Result<bool, OledError> {
        let mut target = self.target.lock();
        if target.generation != generation {
            return Ok(false);
        }
        target.transmit(&Frame::black(self.width, self.height, self.mode))?;
        Ok(true)
    }

    /// Generation of the frame currently on screen (0 before the first blit).
    pub fn generation(&self) -> Generation {
        self.target.lock().generation
    }

    /// Run `f` with shared access to the underlying sink, holding the lock.
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.target.lock().sink)
    }

    /// A black raster the size of the target.
    pub fn blank(&self) -> RasterImage {
        blank_canvas(self.width, self.height)
    }

    pub fn into_inner(self) -> S {
        self.target.into_inner().sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemorySink;
    use image::Rgb;
    use std::sync::Arc;
    use std::thread;

    fn sink() -> BlitSink<MemorySink> {
        BlitSink::new(MemorySink::recording(16, 8, ColorMode::Luma))
    }

    #[test]
    fn clear_leaves_an_all_black_frame_of_target_size() {
        let blit = sink();
        blit.blit(&RasterImage::from_pixel(16, 8, Rgb([255, 255, 255])))
            .unwrap();
        blit.clear().unwrap();
        blit.with_sink(|s| {
            let frame = s.last_frame().unwrap();
            assert_eq!(frame.size(), (16, 8));
            assert!(frame.is_black());
        });
    }

    #[test]
    fn generation_counts_blits() {
        let blit = sink();
        assert_eq!(blit.generation(), 0);
        assert_eq!(blit.clear().unwrap(), 1);
        assert_eq!(blit.blit(&blit.blank()).unwrap(), 2);
        assert_eq!(blit.generation(), 2);
    }

    #[test]
    fn failed_build_transmits_nothing() {
        let blit = sink();
        let err = blit
            .compose(|_| Err(OledError::MissingAsset("logo_path")))
            .unwrap_err();
        assert!(matches!(err, OledError::MissingAsset(_)));
        assert_eq!(blit.with_sink(|s| s.blit_count()), 0);
        assert_eq!(blit.generation(), 0);
    }

    #[test]
    fn wrong_size_raster_is_rejected() {
        let blit = sink();
        let err = blit.blit(&blank_canvas(8, 8)).unwrap_err();
        assert!(matches!(err, OledError::FrameSize { .. }));
    }

    #[test]
    fn stale_clear_is_skipped() {
        let blit = sink();
        let shown = blit.blit(&blit.blank()).unwrap();
        blit.blit(&RasterImage::from_pixel(16, 8, Rgb([255, 255, 255])))
            .unwrap();
        assert!(!blit.clear_if_current(shown).unwrap());
        assert!(!blit.with_sink(|s| s.last_frame().unwrap().is_black()));

        let current = blit.generation();
        assert!(blit.clear_if_current(current).unwrap());
        assert!(blit.with_sink(|s| s.last_frame().unwrap().is_black()));
    }

    #[test]
    fn blit_frame_converts_foreign_modes() {
        let blit = sink();
        let rgb = Frame::from_rgb(
            &RasterImage::from_pixel(16, 8, Rgb([255, 255, 255])),
            ColorMode::Rgb,
        );
        blit.blit_frame(&rgb).unwrap();
        blit.with_sink(|s| {
            let frame = s.last_frame().unwrap();
            assert_eq!(frame.mode(), ColorMode::Luma);
            assert_eq!(frame.brightness(0, 0), Some(255));
        });
    }

    #[test]
    fn concurrent_frames_are_never_mixed() {
        let blit = Arc::new(sink());
        let workers: Vec<_> = [0u8, 255u8]
            .into_iter()
            .map(|shade| {
                let blit = Arc::clone(&blit);
                thread::spawn(move || {
                    for _ in 0..50 {
                        blit.compose(|(w, h)| {
                            let mut raster = blank_canvas(w, h);
                            for (i, p) in raster.pixels_mut().enumerate() {
                                *p = Rgb([shade; 3]);
                                if i % 7 == 0 {
                                    thread::yield_now();
                                }
                            }
                            Ok(raster)
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        blit.with_sink(|s| {
            assert_eq!(s.history().len(), 100);
            for frame in s.history() {
                let first = frame.data()[0];
                assert!(frame.data().iter().all(|&b| b == first));
            }
        });
    }
}

//! Scene change detection using frame-to-frame luminance differencing.
//!
//! Each sampled frame is reduced to a small luminance thumbnail and compared
//! with the previous one using mean absolute difference (MAD). Frames whose
//! score exceeds the threshold become keyframe candidates. The first frame is
//! always a candidate so every video yields at least one keyframe.

use serde::{Deserialize, Serialize};
use shotlist_core::{Frame, KeyframeCandidate, LumaThumbnail, Result, ShotlistError};
use tracing::{debug, warn};

/// Configuration for scene detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDetectConfig {
    /// MAD threshold in `[0, 1]` above which a frame is a candidate (default: 0.15).
    pub scene_threshold: f64,
    /// Width of the luminance thumbnail (default: 64).
    pub thumbnail_width: u32,
    /// Height of the luminance thumbnail (default: 36).
    pub thumbnail_height: u32,
}

impl Default for SceneDetectConfig {
    fn default() -> Self {
        Self {
            scene_threshold: 0.15,
            thumbnail_width: 64,
            thumbnail_height: 36,
        }
    }
}

impl SceneDetectConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.scene_threshold) {
            return Err(ShotlistError::InvalidConfig(format!(
                "scene_threshold must be within [0, 1], got {}",
                self.scene_threshold
            )));
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "thumbnail size must be non-zero, got {}x{}",
                self.thumbnail_width, self.thumbnail_height
            )));
        }
        Ok(())
    }
}

/// Streaming scene change detector.
///
/// Holds only the previous frame's thumbnail; frames are consumed one at a
/// time in timestamp order.
pub struct SceneChangeDetector {
    config: SceneDetectConfig,
    previous: Option<LumaThumbnail>,
    frames_seen: u64,
    candidates_emitted: u64,
}

impl SceneChangeDetector {
    pub fn new(config: SceneDetectConfig) -> Self {
        Self {
            config,
            previous: None,
            frames_seen: 0,
            candidates_emitted: 0,
        }
    }

    pub fn config(&self) -> &SceneDetectConfig {
        &self.config
    }

    /// Number of frames observed so far.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Number of candidates emitted so far.
    pub fn candidates_emitted(&self) -> u64 {
        self.candidates_emitted
    }

    /// Forget the previous frame so the next one seeds a new sequence.
    pub fn reset(&mut self) {
        self.previous = None;
        self.frames_seen = 0;
        self.candidates_emitted = 0;
    }

    /// Feed the next frame, returning a candidate if it starts a new scene.
    pub fn observe(&mut self, frame: Frame) -> Option<KeyframeCandidate> {
        let thumbnail = frame
            .image
            .luma_thumbnail(self.config.thumbnail_width, self.config.thumbnail_height);

        let score = match self.previous.as_ref() {
            None => f64::INFINITY,
            Some(prev) => match prev.mean_absolute_difference(&thumbnail) {
                Some(mad) => mad,
                None => {
                    warn!(
                        timestamp = frame.timestamp,
                        "Thumbnail size changed between frames, treating as a cut"
                    );
                    1.0
                }
            },
        };

        self.previous = Some(thumbnail);
        self.frames_seen += 1;

        if score > self.config.scene_threshold {
            debug!(
                timestamp = frame.timestamp,
                score,
                "Scene change candidate"
            );
            self.candidates_emitted += 1;
            Some(KeyframeCandidate {
                timestamp: frame.timestamp,
                image: frame.image,
                distance_score: score,
            })
        } else {
            None
        }
    }

    /// Lazily turn a fallible frame stream into a candidate stream.
    ///
    /// Upstream errors are passed through unchanged.
    pub fn candidates<I, E>(self, frames: I) -> Candidates<I>
    where
        I: Iterator<Item = std::result::Result<Frame, E>>,
    {
        Candidates {
            detector: self,
            frames,
        }
    }
}

/// Iterator adapter returned by [`SceneChangeDetector::candidates`].
pub struct Candidates<I> {
    detector: SceneChangeDetector,
    frames: I,
}

impl<I> Candidates<I> {
    /// The detector driving this stream.
    pub fn detector(&self) -> &SceneChangeDetector {
        &self.detector
    }
}

impl<I, E> Iterator for Candidates<I>
where
    I: Iterator<Item = std::result::Result<Frame, E>>,
{
    type Item = std::result::Result<KeyframeCandidate, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.frames.next()? {
                Ok(frame) => {
                    if let Some(candidate) = self.detector.observe(frame) {
                        return Some(Ok(candidate));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Helper to create a solid-color RGB frame for testing.
#[cfg(test)]
fn make_solid_frame(timestamp: f64, r: u8, g: u8, b: u8) -> Frame {
    use shotlist_core::{FrameImage, PixelFormat};
    Frame::new(
        timestamp,
        FrameImage::filled(64, 36, PixelFormat::Rgb8, &[r, g, b]).unwrap(),
    )
}

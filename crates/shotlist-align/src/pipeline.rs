//! Keyframe analysis pipeline.
//!
//! Drives the stages of a run over an already-open frame stream:
//! 1. Scene detection and keyframe selection (one streaming pass)
//! 2. Phrase-to-keyframe alignment
//!
//! Reports progress through a callback so the CLI can display a spinner.
//! Nothing is written here; persisting results is left to the caller once
//! the whole analysis has succeeded.

use crate::alignment::{self, AlignConfig, AlignmentReport};
use crate::keyframe_select::{KeyframeSelector, SelectConfig, SelectionStats};
use crate::phrases::PhraseMention;
use crate::scene_detect::{SceneChangeDetector, SceneDetectConfig};
use serde::{Deserialize, Serialize};
use shotlist_core::{Frame, KeyframeSet, MediaResult, Result};
use tracing::info;

/// Progress of the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisProgress {
    /// Current stage being processed.
    pub stage: AnalysisStage,
    /// Overall progress (0.0 to 1.0).
    pub overall_progress: f32,
    /// Frames sampled so far.
    pub frames_sampled: u64,
    /// Human-readable status message.
    pub message: String,
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStage {
    /// Sampling frames and selecting keyframes.
    Detection,
    /// Matching phrases to keyframes.
    Alignment,
    /// All done.
    Complete,
}

impl AnalysisStage {
    /// Display name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Detection => "Detecting keyframes",
            Self::Alignment => "Aligning phrases",
            Self::Complete => "Analysis complete",
        }
    }

    /// Weight of this stage in overall progress (out of 100).
    fn weight(&self) -> f32 {
        match self {
            Self::Detection => 90.0,
            Self::Alignment => 10.0,
            Self::Complete => 0.0,
        }
    }
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(flatten)]
    pub detect: SceneDetectConfig,
    #[serde(flatten)]
    pub select: SelectConfig,
    #[serde(flatten)]
    pub align: AlignConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.detect.validate()?;
        self.select.validate()?;
        self.align.validate()
    }
}

/// Output of keyframe detection.
#[derive(Debug, Clone)]
pub struct Detection {
    pub keyframes: KeyframeSet,
    pub stats: SelectionStats,
    pub frames_sampled: u64,
}

/// Result of the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub keyframes: KeyframeSet,
    pub report: AlignmentReport,
    pub stats: SelectionStats,
    pub frames_sampled: u64,
}

/// Run scene detection and keyframe selection over a frame stream.
///
/// The first frame error aborts the pass.
pub fn detect_keyframes<I>(
    frames: I,
    config: &AnalysisConfig,
    mut progress_callback: impl FnMut(AnalysisProgress),
) -> Result<Detection>
where
    I: IntoIterator<Item = MediaResult<Frame>>,
{
    progress_callback(AnalysisProgress {
        stage: AnalysisStage::Detection,
        overall_progress: 0.0,
        frames_sampled: 0,
        message: "Sampling frames...".into(),
    });

    let mut detector = SceneChangeDetector::new(config.detect.clone());
    let mut selector = KeyframeSelector::new(config.select.clone());

    for frame in frames {
        let frame = frame?;
        let timestamp = frame.timestamp;
        if let Some(candidate) = detector.observe(frame) {
            selector.push(candidate);
        }
        progress_callback(AnalysisProgress {
            stage: AnalysisStage::Detection,
            overall_progress: 0.0,
            frames_sampled: detector.frames_seen(),
            message: format!(
                "Sampled {} frames ({:.1}s), {} keyframes",
                detector.frames_seen(),
                timestamp,
                selector.len()
            ),
        });
    }

    let frames_sampled = detector.frames_seen();
    let stats = selector.stats();
    let keyframes = selector.finish()?;
    info!(
        frames = frames_sampled,
        candidates = detector.candidates_emitted(),
        keyframes = keyframes.len(),
        "Keyframe detection complete"
    );

    Ok(Detection {
        keyframes,
        stats,
        frames_sampled,
    })
}

/// Run the full analysis: detect keyframes, then align the phrases.
///
/// `phrases` should be loaded before the frame stream is opened so that bad
/// metadata fails the run before any decoding starts.
pub fn run_analysis<I>(
    frames: I,
    phrases: &[PhraseMention],
    config: &AnalysisConfig,
    mut progress_callback: impl FnMut(AnalysisProgress),
) -> Result<AnalysisResult>
where
    I: IntoIterator<Item = MediaResult<Frame>>,
{
    let total_weight: f32 = 100.0;
    let mut completed_weight: f32 = 0.0;

    // ── Stage 1: Detection ────────────────────────────────────────────
    let detection = detect_keyframes(frames, config, &mut progress_callback)?;
    completed_weight += AnalysisStage::Detection.weight();

    // ── Stage 2: Alignment ────────────────────────────────────────────
    progress_callback(AnalysisProgress {
        stage: AnalysisStage::Alignment,
        overall_progress: completed_weight / total_weight,
        frames_sampled: detection.frames_sampled,
        message: format!("Aligning {} phrases...", phrases.len()),
    });

    let report = alignment::align(phrases, &detection.keyframes, &config.align);

    // ── Done ──────────────────────────────────────────────────────────
    progress_callback(AnalysisProgress {
        stage: AnalysisStage::Complete,
        overall_progress: 1.0,
        frames_sampled: detection.frames_sampled,
        message: "Analysis complete".into(),
    });

    Ok(AnalysisResult {
        keyframes: detection.keyframes,
        report,
        stats: detection.stats,
        frames_sampled: detection.frames_sampled,
    })
}

#[cfg(test)]
fn make_solid_frame(timestamp: f64, value: u8) -> MediaResult<Frame> {
    use shotlist_core::{FrameImage, PixelFormat};
    Ok(Frame::new(
        timestamp,
        FrameImage::filled(32, 18, PixelFormat::Rgb8, &[value, value, value])?,
    ))
}

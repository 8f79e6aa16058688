//! Shotlist Align - from sampled frames and phrases to a product listing
//!
//! Provides:
//! - Scene change detection over downsampled luminance
//! - Streaming keyframe selection with spacing and replacement rules
//! - Phrase metadata loading and normalization
//! - Phrase-to-keyframe temporal alignment
//! - The end-to-end analysis pipeline and listing output

pub mod alignment;
pub mod keyframe_select;
pub mod listing_store;
pub mod phrases;
pub mod pipeline;
pub mod scene_detect;

pub use alignment::{align, AlignConfig, AlignmentReport, AlignmentWarning, ProductMatch};
pub use keyframe_select::{Decision, KeyframeSelector, SelectConfig, SelectionStats};
pub use listing_store::{KeyframeRecord, ListingStore, ProductListing};
pub use phrases::{load_phrases, parse_phrases, PhraseLoadConfig, PhraseMention};
pub use pipeline::{
    detect_keyframes, run_analysis, AnalysisConfig, AnalysisProgress, AnalysisResult,
    AnalysisStage, Detection,
};
pub use scene_detect::{SceneChangeDetector, SceneDetectConfig};

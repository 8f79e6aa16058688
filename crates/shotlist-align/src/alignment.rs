//! Phrase-to-keyframe temporal alignment.
//!
//! Each phrase interval `[start, end]` is widened by the tolerance on both
//! sides and the keyframes inside that window are ranked by distance to the
//! phrase midpoint. The nearest keyframe wins; keyframes tied with it (within
//! `tie_epsilon`) are kept too, in id order.
//!
//! Phrases are independent, so they are aligned in parallel against the
//! read-only keyframe set. Output order always equals phrase order.

use crate::phrases::PhraseMention;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shotlist_core::{KeyframeId, KeyframeIds, KeyframeSet, Result, ShotlistError};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Configuration for alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Seconds added on both sides of a phrase interval (default: 1.5).
    pub alignment_tolerance: f64,
    /// Distances closer than this are treated as ties (default: 0.001).
    pub tie_epsilon: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            alignment_tolerance: 1.5,
            tie_epsilon: 1e-3,
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.alignment_tolerance.is_finite() || self.alignment_tolerance < 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "alignment_tolerance must be a non-negative number, got {}",
                self.alignment_tolerance
            )));
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "tie_epsilon must be a non-negative number, got {}",
                self.tie_epsilon
            )));
        }
        Ok(())
    }

    /// Confidence for a match at distance `d` from the phrase midpoint.
    fn confidence(&self, d: f64) -> f64 {
        if self.alignment_tolerance > 0.0 {
            1.0 - (d / self.alignment_tolerance).min(1.0)
        } else if d <= self.tie_epsilon {
            1.0
        } else {
            0.0
        }
    }
}

/// The alignment result for one phrase mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product_name: String,
    pub raw_text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Matched keyframes in id order; empty when nothing was in range.
    pub matched_keyframe_ids: KeyframeIds,
    /// Match quality in `[0, 1]`; 0 when unmatched.
    pub confidence: f64,
}

impl ProductMatch {
    pub fn is_matched(&self) -> bool {
        !self.matched_keyframe_ids.is_empty()
    }
}

/// A phrase that found no keyframe within tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentWarning {
    /// Position of the phrase in the aligned list.
    pub phrase_index: usize,
    pub product_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub message: String,
}

/// Matches for every phrase plus the warnings raised along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub matches: Vec<ProductMatch>,
    pub warnings: Vec<AlignmentWarning>,
}

impl AlignmentReport {
    /// Distinct keyframe ids referenced by any match.
    pub fn matched_ids(&self) -> BTreeSet<KeyframeId> {
        self.matches
            .iter()
            .flat_map(|m| m.matched_keyframe_ids.iter().copied())
            .collect()
    }

    /// Number of phrases with at least one keyframe.
    pub fn matched_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_matched()).count()
    }
}

/// Align every phrase to the keyframe set.
pub fn align(
    phrases: &[PhraseMention],
    keyframes: &KeyframeSet,
    config: &AlignConfig,
) -> AlignmentReport {
    let results: Vec<(ProductMatch, Option<AlignmentWarning>)> = phrases
        .par_iter()
        .enumerate()
        .map(|(index, phrase)| align_one(index, phrase, keyframes, config))
        .collect();

    let mut report = AlignmentReport {
        matches: Vec::with_capacity(results.len()),
        warnings: Vec::new(),
    };
    for (product_match, warning) in results {
        report.matches.push(product_match);
        if let Some(warning) = warning {
            warn!(
                phrase = warning.phrase_index,
                product = %warning.product_name,
                start = warning.start_time,
                end = warning.end_time,
                "{}",
                warning.message
            );
            report.warnings.push(warning);
        }
    }

    info!(
        phrases = phrases.len(),
        matched = report.matched_count(),
        unmatched = report.warnings.len(),
        "Alignment complete"
    );
    report
}

fn align_one(
    index: usize,
    phrase: &PhraseMention,
    keyframes: &KeyframeSet,
    config: &AlignConfig,
) -> (ProductMatch, Option<AlignmentWarning>) {
    let span = phrase.span();
    let midpoint = span.midpoint();
    let window = keyframes.window(span.widen(config.alignment_tolerance));

    let mut product_match = ProductMatch {
        product_name: phrase.product_name.clone(),
        raw_text: phrase.raw_text.clone(),
        start_time: phrase.start_time,
        end_time: phrase.end_time,
        matched_keyframe_ids: KeyframeIds::new(),
        confidence: 0.0,
    };

    let Some(best) = window
        .iter()
        .map(|k| (k.timestamp - midpoint).abs())
        .min_by(f64::total_cmp)
    else {
        let warning = AlignmentWarning {
            phrase_index: index,
            product_name: phrase.product_name.clone(),
            start_time: phrase.start_time,
            end_time: phrase.end_time,
            message: format!(
                "No keyframe within {}s of {span}",
                config.alignment_tolerance
            ),
        };
        return (product_match, Some(warning));
    };

    product_match.matched_keyframe_ids = window
        .iter()
        .filter(|k| (k.timestamp - midpoint).abs() - best <= config.tie_epsilon)
        .map(|k| k.id)
        .collect();
    product_match.confidence = config.confidence(best);

    (product_match, None)
}

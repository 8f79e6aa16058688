//! Streaming keyframe selection.
//!
//! Candidates arrive in timestamp order. A candidate is selected when it is
//! at least `min_spacing` seconds after the last selection. A candidate that
//! arrives too soon can still replace the last selection if its score beats
//! it by more than `replace_margin`; the replacement keeps the same id.

use serde::{Deserialize, Serialize};
use shotlist_core::{Keyframe, KeyframeCandidate, KeyframeId, KeyframeSet, Result, ShotlistError};
use tracing::{debug, info};

/// Configuration for keyframe selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectConfig {
    /// Minimum seconds between selected keyframes (default: 1.0).
    pub min_spacing: f64,
    /// Score advantage required to replace the last selection (default: 0.1).
    pub replace_margin: f64,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            min_spacing: 1.0,
            replace_margin: 0.1,
        }
    }
}

impl SelectConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_spacing.is_finite() || self.min_spacing < 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "min_spacing must be a non-negative number, got {}",
                self.min_spacing
            )));
        }
        if !self.replace_margin.is_finite() || self.replace_margin < 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "replace_margin must be a non-negative number, got {}",
                self.replace_margin
            )));
        }
        Ok(())
    }
}

/// Counts of selection decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub selected: usize,
    pub replaced: usize,
    pub dropped: usize,
}

impl SelectionStats {
    /// Total candidates seen.
    pub fn total(&self) -> usize {
        self.selected + self.replaced + self.dropped
    }
}

/// What happened to a pushed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Selected(KeyframeId),
    Replaced(KeyframeId),
    Dropped,
}

/// Streaming keyframe selector.
pub struct KeyframeSelector {
    config: SelectConfig,
    selected: Vec<Keyframe>,
    last_selected_time: f64,
    next_id: u64,
    stats: SelectionStats,
}

impl KeyframeSelector {
    pub fn new(config: SelectConfig) -> Self {
        Self {
            config,
            selected: Vec::new(),
            last_selected_time: f64::NEG_INFINITY,
            next_id: 0,
            stats: SelectionStats::default(),
        }
    }

    pub fn stats(&self) -> SelectionStats {
        self.stats
    }

    /// Number of keyframes selected so far.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Offer the next candidate.
    pub fn push(&mut self, candidate: KeyframeCandidate) -> Decision {
        let t = candidate.timestamp;

        if t > self.last_selected_time && t - self.last_selected_time >= self.config.min_spacing {
            let id = KeyframeId(self.next_id);
            self.next_id += 1;
            debug!(%id, timestamp = t, score = candidate.distance_score, "Keyframe selected");
            self.selected.push(Keyframe::from_candidate(id, candidate));
            self.last_selected_time = t;
            self.stats.selected += 1;
            return Decision::Selected(id);
        }

        if let Some(last) = self.selected.last_mut() {
            if t >= last.timestamp
                && candidate.distance_score > last.distance_score + self.config.replace_margin
            {
                let id = last.id;
                debug!(
                    %id,
                    from = last.timestamp,
                    to = t,
                    score = candidate.distance_score,
                    "Keyframe replaced"
                );
                *last = Keyframe::from_candidate(id, candidate);
                self.last_selected_time = t;
                self.stats.replaced += 1;
                return Decision::Replaced(id);
            }
        }

        debug!(timestamp = t, score = candidate.distance_score, "Candidate dropped");
        self.stats.dropped += 1;
        Decision::Dropped
    }

    /// Close the stream and return the selected keyframes.
    pub fn finish(self) -> Result<KeyframeSet> {
        info!(
            keyframes = self.selected.len(),
            replaced = self.stats.replaced,
            dropped = self.stats.dropped,
            "Keyframe selection complete"
        );
        KeyframeSet::new(self.selected)
    }
}

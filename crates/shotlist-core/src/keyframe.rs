//! Keyframes: the representative frames selected from a video.

use crate::error::{Result, ShotlistError};
use crate::frame::FrameImage;
use crate::time::TimeSpan;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a selected keyframe. Assigned in selection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeId(pub u64);

impl fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered ids of the keyframes matched to one phrase. Almost always one.
pub type KeyframeIds = SmallVec<[KeyframeId; 2]>;

/// A frame flagged by the scene change detector.
#[derive(Debug, Clone)]
pub struct KeyframeCandidate {
    pub timestamp: f64,
    pub image: FrameImage,
    /// Normalized distance to the previous sampled frame; `+inf` for the
    /// first frame of the video.
    pub distance_score: f64,
}

impl KeyframeCandidate {
    /// True for the first-frame candidate that seeds the sequence.
    pub fn is_seed(&self) -> bool {
        self.distance_score.is_infinite()
    }
}

/// A selected keyframe.
#[derive(Debug, Clone)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub timestamp: f64,
    pub image: FrameImage,
    pub distance_score: f64,
    /// Where the still was written, once persisted.
    pub source_path: Option<PathBuf>,
}

impl Keyframe {
    pub fn from_candidate(id: KeyframeId, candidate: KeyframeCandidate) -> Self {
        Self {
            id,
            timestamp: candidate.timestamp,
            image: candidate.image,
            distance_score: candidate.distance_score,
            source_path: None,
        }
    }

    /// The persisted file name, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }
}

/// The ordered, immutable output of keyframe selection.
///
/// Timestamps and ids are strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct KeyframeSet {
    keyframes: Vec<Keyframe>,
}

impl KeyframeSet {
    /// Build a set, checking that timestamps and ids strictly increase.
    pub fn new(keyframes: Vec<Keyframe>) -> Result<Self> {
        for pair in keyframes.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp || pair[1].id <= pair[0].id {
                return Err(ShotlistError::Internal(format!(
                    "keyframes out of order: #{} @ {:.3}s followed by #{} @ {:.3}s",
                    pair[0].id, pair[0].timestamp, pair[1].id, pair[1].timestamp
                )));
            }
        }
        Ok(Self { keyframes })
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Keyframe> {
        self.keyframes.iter()
    }

    pub fn as_slice(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Look up a keyframe by id (binary search; ids are sorted).
    pub fn get(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes
            .binary_search_by_key(&id, |k| k.id)
            .ok()
            .map(|i| &self.keyframes[i])
    }

    pub fn contains_id(&self, id: KeyframeId) -> bool {
        self.get(id).is_some()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.keyframes.iter().map(|k| k.timestamp).collect()
    }

    /// Keyframes whose timestamp lies inside `span` (inclusive), located by
    /// binary search.
    pub fn window(&self, span: TimeSpan) -> &[Keyframe] {
        let lo = self.keyframes.partition_point(|k| k.timestamp < span.start);
        let hi = self.keyframes.partition_point(|k| k.timestamp <= span.end);
        if lo >= hi {
            return &[];
        }
        &self.keyframes[lo..hi]
    }

    /// Record persisted file locations, returning the updated set.
    pub fn with_source_paths(
        mut self,
        paths: impl IntoIterator<Item = (KeyframeId, PathBuf)>,
    ) -> Self {
        for (id, path) in paths {
            if let Ok(i) = self.keyframes.binary_search_by_key(&id, |k| k.id) {
                self.keyframes[i].source_path = Some(path);
            }
        }
        self
    }
}

impl<'a> IntoIterator for &'a KeyframeSet {
    type Item = &'a Keyframe;
    type IntoIter = std::slice::Iter<'a, Keyframe>;

    fn into_iter(self) -> Self::IntoIter {
        self.keyframes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use proptest::prelude::*;

    fn keyframe(id: u64, timestamp: f64) -> Keyframe {
        Keyframe {
            id: KeyframeId(id),
            timestamp,
            image: FrameImage::filled(2, 2, PixelFormat::Gray8, &[0]).unwrap(),
            distance_score: 1.0,
            source_path: None,
        }
    }

    fn set(times: &[f64]) -> KeyframeSet {
        KeyframeSet::new(
            times
                .iter()
                .enumerate()
                .map(|(i, &t)| keyframe(i as u64, t))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let result = KeyframeSet::new(vec![keyframe(0, 2.0), keyframe(1, 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_window_is_inclusive() {
        let set = set(&[0.0, 2.0, 4.0]);
        let hits = set.window(TimeSpan::new(2.0, 4.0));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, KeyframeId(1));
    }

    #[test]
    fn test_window_miss() {
        let set = set(&[0.0, 2.0, 4.0]);
        assert!(set.window(TimeSpan::new(2.5, 3.5)).is_empty());
        assert!(set.window(TimeSpan::new(9.0, 10.0)).is_empty());
    }

    #[test]
    fn test_get_by_id() {
        let set = set(&[0.0, 2.0, 4.0]);
        assert_eq!(set.get(KeyframeId(2)).map(|k| k.timestamp), Some(4.0));
        assert!(!set.contains_id(KeyframeId(7)));
    }

    #[test]
    fn test_with_source_paths() {
        let set = set(&[0.0, 2.0])
            .with_source_paths([(KeyframeId(1), PathBuf::from("out/kf.1.2000.jpg"))]);
        assert_eq!(
            set.get(KeyframeId(1)).and_then(|k| k.file_name()),
            Some("kf.1.2000.jpg")
        );
        assert!(set.get(KeyframeId(0)).unwrap().source_path.is_none());
    }

    proptest! {
        #[test]
        fn window_matches_linear_scan(
            mut times in proptest::collection::vec(0.0f64..100.0, 0..40),
            start in 0.0f64..100.0,
            len in 0.0f64..20.0,
        ) {
            times.sort_by(|a, b| a.partial_cmp(b).unwrap());
            times.dedup();
            let set = set(&times);
            let span = TimeSpan::new(start, start + len);
            let expected: Vec<f64> = times.iter().copied().filter(|&t| span.contains(t)).collect();
            let got: Vec<f64> = set.window(span).iter().map(|k| k.timestamp).collect();
            prop_assert_eq!(got, expected);
        }
    }
}

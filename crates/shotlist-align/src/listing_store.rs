//! Product listing output.
//!
//! Writes the results of a run into the output directory:
//! ```text
//! outdir/
//!   product_listing.json      # keyframes, product matches, warnings
//!   keyframes_index.csv       # one row per selected keyframe
//!   phrase_keyframe_map.csv   # one row per product match
//! ```
//! The JSON carries no wall-clock data, so identical inputs produce
//! byte-identical files.

use crate::alignment::{AlignmentReport, AlignmentWarning, ProductMatch};
use serde::{Deserialize, Serialize};
use shotlist_core::{
    format_timecode, seconds_to_millis, Keyframe, KeyframeId, KeyframeSet, Result, ShotlistError,
};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

pub const LISTING_FILE: &str = "product_listing.json";
pub const KEYFRAME_INDEX_FILE: &str = "keyframes_index.csv";
pub const PHRASE_MAP_FILE: &str = "phrase_keyframe_map.csv";

/// A selected keyframe as recorded in the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeRecord {
    pub id: KeyframeId,
    pub timestamp: f64,
    pub timestamp_ms: u64,
    pub timecode: String,
    /// Scene change score; `None` for the first frame of the video.
    pub score: Option<f64>,
    /// Still file name, when one was written for this keyframe.
    pub file: Option<String>,
}

impl From<&Keyframe> for KeyframeRecord {
    fn from(keyframe: &Keyframe) -> Self {
        Self {
            id: keyframe.id,
            timestamp: keyframe.timestamp,
            timestamp_ms: seconds_to_millis(keyframe.timestamp),
            timecode: format_timecode(keyframe.timestamp),
            score: keyframe
                .distance_score
                .is_finite()
                .then_some(keyframe.distance_score),
            file: keyframe.file_name().map(str::to_string),
        }
    }
}

/// Everything a run produces, in output form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    /// The video as given on the command line.
    pub video: String,
    pub keyframes: Vec<KeyframeRecord>,
    pub products: Vec<ProductMatch>,
    pub warnings: Vec<AlignmentWarning>,
}

impl ProductListing {
    pub fn new(video: &Path, keyframes: &KeyframeSet, report: &AlignmentReport) -> Self {
        Self {
            video: video.display().to_string(),
            keyframes: keyframes.iter().map(KeyframeRecord::from).collect(),
            products: report.matches.clone(),
            warnings: report.warnings.clone(),
        }
    }

    fn keyframe(&self, id: KeyframeId) -> Option<&KeyframeRecord> {
        self.keyframes
            .binary_search_by_key(&id, |k| k.id)
            .ok()
            .map(|i| &self.keyframes[i])
    }

    /// Keyframe index CSV: `id,timestamp_ms,timecode,score,filename`.
    pub fn keyframe_index_csv(&self) -> String {
        let mut out = String::from("id,timestamp_ms,timecode,score,filename\n");
        for k in &self.keyframes {
            let score = k.score.map(|s| format!("{s:.6}")).unwrap_or_default();
            let _ = writeln!(
                out,
                "{},{},{},{},{}",
                k.id,
                k.timestamp_ms,
                k.timecode,
                score,
                csv_field(k.file.as_deref().unwrap_or(""))
            );
        }
        out
    }

    /// Phrase map CSV: one row per product match, ids and files joined by `;`.
    pub fn phrase_map_csv(&self) -> String {
        let mut out = String::from(
            "phrase_idx,product_name,phrase_text,start_ms,start_tc,end_ms,end_tc,\
             anchor_ms,anchor_tc,matched_keyframe_ids,matched_keyframe_ms,\
             matched_filenames,confidence\n",
        );
        for (idx, m) in self.products.iter().enumerate() {
            let anchor = (m.start_time + m.end_time) / 2.0;
            let matched: Vec<&KeyframeRecord> = m
                .matched_keyframe_ids
                .iter()
                .filter_map(|id| self.keyframe(*id))
                .collect();
            let ids = join(matched.iter().map(|k| k.id.to_string()));
            let times = join(matched.iter().map(|k| k.timestamp_ms.to_string()));
            let files = join(matched.iter().filter_map(|k| k.file.clone()));

            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{},{},{},{:.3}",
                idx + 1,
                csv_field(&m.product_name),
                csv_field(&m.raw_text),
                seconds_to_millis(m.start_time),
                format_timecode(m.start_time),
                seconds_to_millis(m.end_time),
                format_timecode(m.end_time),
                seconds_to_millis(anchor),
                format_timecode(anchor),
                ids,
                times,
                csv_field(&files),
                m.confidence
            );
        }
        out
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(";")
}

/// Quote a CSV field when it holds a delimiter, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Writes and reads listing files in an output directory.
pub struct ListingStore {
    outdir: PathBuf,
}

impl ListingStore {
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn listing_path(&self) -> PathBuf {
        self.outdir.join(LISTING_FILE)
    }

    pub fn has_listing(&self) -> bool {
        self.listing_path().exists()
    }

    /// Save the listing JSON.
    pub fn save_listing(&self, listing: &ProductListing) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.outdir)?;
        let mut json = serde_json::to_string_pretty(listing).map_err(|e| {
            ShotlistError::Serialization(format!("Failed to serialize listing: {e}"))
        })?;
        json.push('\n');
        let path = self.listing_path();
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Load a previously saved listing.
    pub fn load_listing(&self) -> Result<ProductListing> {
        let path = self.listing_path();
        if !path.exists() {
            return Err(ShotlistError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("listing not found: {}", path.display()),
            )));
        }
        let json = std::fs::read_to_string(&path)?;
        serde_json::from_str(&json).map_err(|e| {
            ShotlistError::Serialization(format!("Failed to deserialize listing: {e}"))
        })
    }

    /// Save the JSON listing and both CSV files.
    pub fn save_all(&self, listing: &ProductListing) -> Result<Vec<PathBuf>> {
        let listing_path = self.save_listing(listing)?;

        let index_path = self.outdir.join(KEYFRAME_INDEX_FILE);
        std::fs::write(&index_path, listing.keyframe_index_csv())?;

        let map_path = self.outdir.join(PHRASE_MAP_FILE);
        std::fs::write(&map_path, listing.phrase_map_csv())?;

        info!(
            outdir = %self.outdir.display(),
            keyframes = listing.keyframes.len(),
            products = listing.products.len(),
            "Product listing written"
        );
        Ok(vec![listing_path, index_path, map_path])
    }
}

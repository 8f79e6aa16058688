//! Phrase metadata loading.
//!
//! Accepts either a list of product mentions or a content-analyzer result
//! whose transcript words are split into punctuation-delimited segments.
//! Mentions are validated, merged per product and sorted by start time.
//!
//! Mention list format:
//! ```text
//! [
//!   {"product_name": "Blue Mug", "start_time": 2.3, "end_time": 2.3, "raw_text": "this blue mug"},
//!   {"product": "Lamp", "start_time_ms": 4100, "end_time_ms": 5200}
//! ]
//! ```
//! The same list may be wrapped as `{"mentions": [...]}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shotlist_core::{MetadataError, Result, ShotlistError, TimeSpan};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// A time-stamped span of narration that refers to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseMention {
    pub product_name: String,
    /// Start time in seconds.
    pub start_time: f64,
    /// End time in seconds (`>= start_time`).
    pub end_time: f64,
    pub raw_text: String,
}

impl PhraseMention {
    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.end_time)
    }
}

/// Configuration for phrase loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseLoadConfig {
    /// Mentions of one product closer than this many seconds are merged
    /// (default: 0.5).
    pub merge_gap: f64,
}

impl Default for PhraseLoadConfig {
    fn default() -> Self {
        Self { merge_gap: 0.5 }
    }
}

impl PhraseLoadConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.merge_gap.is_finite() || self.merge_gap < 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "merge_gap must be a non-negative number, got {}",
                self.merge_gap
            )));
        }
        Ok(())
    }
}

/// Load and normalize phrase mentions from a metadata file.
pub fn load_phrases<P: AsRef<Path>>(
    path: P,
    config: &PhraseLoadConfig,
) -> MetadataResult<Vec<PhraseMention>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MetadataError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let json = std::fs::read_to_string(path)?;
    let mentions = parse_phrases(&json, config)?;
    info!(
        metadata = %path.display(),
        mentions = mentions.len(),
        "Phrase metadata loaded"
    );
    Ok(mentions)
}

/// Parse and normalize phrase mentions from a JSON string.
pub fn parse_phrases(json: &str, config: &PhraseLoadConfig) -> MetadataResult<Vec<PhraseMention>> {
    let value: Value = serde_json::from_str(json).map_err(|e| MetadataError::Parse(e.to_string()))?;

    let raw = match &value {
        Value::Array(items) => parse_records(items)?,
        Value::Object(map) => match (map.get("mentions"), map.get("result")) {
            (Some(Value::Array(items)), _) => parse_records(items)?,
            (Some(_), _) => {
                return Err(MetadataError::UnrecognizedFormat(
                    "`mentions` must be an array".into(),
                ))
            }
            (None, Some(result)) => parse_analyzer_result(result)?,
            (None, None) => {
                return Err(MetadataError::UnrecognizedFormat(
                    "expected `mentions` or an analyzer `result`".into(),
                ))
            }
        },
        _ => {
            return Err(MetadataError::UnrecognizedFormat(
                "top level must be an array or an object".into(),
            ))
        }
    };

    Ok(merge_mentions(raw, config.merge_gap))
}

// ── Mention records ──────────────────────────────────────────────

fn parse_records(items: &[Value]) -> MetadataResult<Vec<PhraseMention>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_record(index, item))
        .collect()
}

fn parse_record(index: usize, item: &Value) -> MetadataResult<PhraseMention> {
    let obj = item.as_object().ok_or_else(|| {
        MetadataError::UnrecognizedFormat(format!("mention {index} is not an object"))
    })?;

    let product_name = string_field(obj, &["product_name", "product"])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(MetadataError::MissingProductName { index })?
        .to_string();

    let start_time = time_field(
        obj,
        index,
        "start_time",
        &["start_time_ms", "startTimeMs"],
    )?;
    let end_time = time_field(obj, index, "end_time", &["end_time_ms", "endTimeMs"])?;
    if end_time < start_time {
        return Err(MetadataError::InvertedInterval {
            index,
            start: start_time,
            end: end_time,
        });
    }

    let raw_text = string_field(obj, &["raw_text", "text"])
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(&product_name)
        .to_string();

    Ok(PhraseMention {
        product_name,
        start_time,
        end_time,
        raw_text,
    })
}

fn string_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

/// Read a timestamp in seconds from `field`, or in milliseconds from one of
/// `ms_fields`.
fn time_field(
    obj: &Map<String, Value>,
    index: usize,
    field: &'static str,
    ms_fields: &[&str],
) -> MetadataResult<f64> {
    let seconds = match obj.get(field) {
        Some(value) => number(index, field, value)?,
        None => {
            let value = ms_fields
                .iter()
                .find_map(|k| obj.get(*k))
                .ok_or(MetadataError::MissingTimestamp { index, field })?;
            number(index, field, value)? / 1000.0
        }
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(MetadataError::InvalidTimestamp {
            index,
            field,
            value: seconds,
        });
    }
    Ok(seconds)
}

fn number(index: usize, field: &'static str, value: &Value) -> MetadataResult<f64> {
    match value {
        Value::Null => Err(MetadataError::MissingTimestamp { index, field }),
        other => other.as_f64().ok_or_else(|| {
            MetadataError::Parse(format!("mention {index}: {field} is not a number"))
        }),
    }
}

// ── Analyzer transcript ──────────────────────────────────────────

/// Split `contents[0].transcriptPhrases[].words[]` into segments closed by a
/// word ending in `,` or `.`.
fn parse_analyzer_result(result: &Value) -> MetadataResult<Vec<PhraseMention>> {
    let contents = result
        .get("contents")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            MetadataError::UnrecognizedFormat("analyzer result has no `contents` array".into())
        })?;
    let Some(content) = contents.first() else {
        return Ok(Vec::new());
    };
    let phrases = content
        .get("transcriptPhrases")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut segments = Vec::new();
    let mut word_index = 0usize;

    for phrase in phrases {
        let words = phrase
            .get("words")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut current: Vec<&str> = Vec::new();
        let mut segment_start: Option<f64> = None;
        let mut last_end = 0.0;

        for word in words {
            let obj = word.as_object().ok_or_else(|| {
                MetadataError::UnrecognizedFormat(format!("word {word_index} is not an object"))
            })?;
            let text = obj.get("text").and_then(Value::as_str).unwrap_or("").trim();
            let start = time_field(obj, word_index, "start_time", &["startTimeMs"])?;
            let end = time_field(obj, word_index, "end_time", &["endTimeMs"])?;
            word_index += 1;

            segment_start.get_or_insert(start);
            last_end = end;
            current.push(text);

            if text.ends_with(',') || text.ends_with('.') {
                if let Some(start) = segment_start.take() {
                    push_segment(&mut segments, &current, start, end);
                }
                current.clear();
            }
        }

        if let Some(start) = segment_start {
            push_segment(&mut segments, &current, start, last_end);
        }
    }

    Ok(segments)
}

fn push_segment(segments: &mut Vec<PhraseMention>, words: &[&str], start: f64, end: f64) {
    let joined = words.join(" ").replace(" ,", ",").replace(" .", ".");
    let text = joined.trim().trim_end_matches([',', '.']).trim();
    if text.is_empty() {
        debug!(start, end, "Skipping empty transcript segment");
        return;
    }
    segments.push(PhraseMention {
        product_name: text.to_string(),
        start_time: start,
        end_time: end.max(start),
        raw_text: text.to_string(),
    });
}

// ── Normalization ────────────────────────────────────────────────

struct Pending {
    mention: PhraseMention,
    texts: Vec<String>,
}

/// Merge overlapping or near mentions of the same product and sort by start.
fn merge_mentions(mut mentions: Vec<PhraseMention>, merge_gap: f64) -> Vec<PhraseMention> {
    mentions.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut merged: Vec<Pending> = Vec::with_capacity(mentions.len());
    let mut latest_by_product: HashMap<String, usize> = HashMap::new();

    for mention in mentions {
        let key = mention.product_name.trim().to_lowercase();

        if let Some(&i) = latest_by_product.get(&key) {
            let pending = &mut merged[i];
            if pending.mention.span().touches(mention.span(), merge_gap) {
                let span = pending.mention.span().union(mention.span());
                pending.mention.start_time = span.start;
                pending.mention.end_time = span.end;
                if !pending.texts.contains(&mention.raw_text) {
                    pending.texts.push(mention.raw_text);
                }
                continue;
            }
        }

        latest_by_product.insert(key, merged.len());
        merged.push(Pending {
            texts: vec![mention.raw_text.clone()],
            mention,
        });
    }

    merged
        .into_iter()
        .map(|p| PhraseMention {
            raw_text: p.texts.join("; "),
            ..p.mention
        })
        .collect()
}

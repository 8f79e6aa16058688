//! End-to-end analysis tests.
//!
//! Exercises shotlist-align's pipeline against synthetic frame streams and
//! phrase metadata parsed from JSON, the way the CLI wires them together.

use shotlist_align::{
    parse_phrases, run_analysis, AnalysisConfig, ListingStore, PhraseLoadConfig, PhraseMention,
    ProductListing,
};
use shotlist_core::{
    Frame, FrameImage, KeyframeId, MediaError, MediaResult, PixelFormat, Result, ShotlistError,
};
use shotlist_media::{StillOptions, StillWriter};
use std::path::{Path, PathBuf};

// ── Helpers ────────────────────────────────────────────────────

/// One solid gray 64x36 frame per `(timestamp, luma)` pair.
fn frames(samples: &[(f64, u8)]) -> Vec<MediaResult<Frame>> {
    samples
        .iter()
        .map(|&(t, v)| {
            FrameImage::filled(64, 36, PixelFormat::Rgb8, &[v, v, v]).map(|img| Frame::new(t, img))
        })
        .collect()
}

fn config(threshold: f64, min_spacing: f64, tolerance: f64) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.detect.scene_threshold = threshold;
    config.select.min_spacing = min_spacing;
    config.align.alignment_tolerance = tolerance;
    config
}

/// Analyze a frame stream, then write stills plus listing files, as the
/// CLI does. Nothing is written unless the analysis succeeds.
fn analyze_and_write(
    stream: Vec<MediaResult<Frame>>,
    phrases: &[PhraseMention],
    config: &AnalysisConfig,
    outdir: &Path,
) -> Result<ProductListing> {
    let result = run_analysis(stream, phrases, config, |_| {})?;

    let writer = StillWriter::new(outdir, StillOptions::default());
    let written = writer.write_all(&result.keyframes, |_| true)?;
    let keyframes = result.keyframes.with_source_paths(written);

    let listing = ProductListing::new(Path::new("clip.mp4"), &keyframes, &result.report);
    ListingStore::new(outdir).save_all(&listing)?;
    Ok(listing)
}

fn run_to_dir(
    samples: &[(f64, u8)],
    metadata: &str,
    config: &AnalysisConfig,
    outdir: &Path,
) -> ProductListing {
    let phrases = parse_phrases(metadata, &PhraseLoadConfig::default()).unwrap();
    analyze_and_write(frames(samples), &phrases, config, outdir).unwrap()
}

// ── Detection & selection ──────────────────────────────────────

#[test]
fn spacing_scenario_selects_every_other_second() {
    // Frame-to-frame scores: inf, 0.10, 0.80, 0.05, 0.85, 0.10
    let samples = [
        (0.0, 230),
        (1.0, 204),
        (2.0, 0),
        (3.0, 13),
        (4.0, 230),
        (5.0, 204),
    ];
    let result = run_analysis(frames(&samples), &[], &config(0.5, 2.0, 1.5), |_| {}).unwrap();
    assert_eq!(result.keyframes.timestamps(), vec![0.0, 2.0, 4.0]);
    assert_eq!(result.stats.selected, 3);
}

#[test]
fn single_frame_video_yields_seed_keyframe() {
    let result =
        run_analysis(frames(&[(0.0, 40)]), &[], &AnalysisConfig::default(), |_| {}).unwrap();
    assert_eq!(result.keyframes.len(), 1);
    let seed = result.keyframes.get(KeyframeId(0)).unwrap();
    assert_eq!(seed.timestamp, 0.0);
    assert!(seed.distance_score.is_infinite());
}

#[test]
fn empty_stream_yields_no_keyframes() {
    let result = run_analysis(frames(&[]), &[], &AnalysisConfig::default(), |_| {}).unwrap();
    assert!(result.keyframes.is_empty());
    assert_eq!(result.frames_sampled, 0);
}

// ── Alignment ──────────────────────────────────────────────────

#[test]
fn blue_mug_matches_keyframe_at_two_seconds() {
    let samples = [(0.0, 0), (1.0, 0), (2.0, 200), (3.0, 200), (4.0, 50)];
    let phrases = parse_phrases(
        r#"[{"product_name": "Blue Mug", "start_time": 2.3, "end_time": 2.3}]"#,
        &PhraseLoadConfig::default(),
    )
    .unwrap();
    let result =
        run_analysis(frames(&samples), &phrases, &config(0.15, 1.0, 1.0), |_| {}).unwrap();

    assert_eq!(result.keyframes.timestamps(), vec![0.0, 2.0, 4.0]);
    let m = &result.report.matches[0];
    assert_eq!(m.matched_keyframe_ids.as_slice(), &[KeyframeId(1)]);
    assert!((m.confidence - 0.7).abs() < 1e-9, "got {}", m.confidence);
}

#[test]
fn merged_mentions_produce_one_match() {
    let samples = [(0.0, 0), (2.0, 200)];
    let phrases = parse_phrases(
        r#"[
            {"product_name": "Lamp", "start_time": 1.0, "end_time": 2.0},
            {"product_name": "Lamp", "start_time": 1.5, "end_time": 3.0}
        ]"#,
        &PhraseLoadConfig::default(),
    )
    .unwrap();
    let result =
        run_analysis(frames(&samples), &phrases, &AnalysisConfig::default(), |_| {}).unwrap();

    assert_eq!(result.report.matches.len(), 1);
    let m = &result.report.matches[0];
    assert_eq!((m.start_time, m.end_time), (1.0, 3.0));
    assert_eq!(m.matched_keyframe_ids.as_slice(), &[KeyframeId(1)]);
}

#[test]
fn unmatched_phrase_is_kept_with_warning() {
    let phrases = parse_phrases(
        r#"[{"product_name": "Rug", "start_time": 30.0, "end_time": 31.0}]"#,
        &PhraseLoadConfig::default(),
    )
    .unwrap();
    let result = run_analysis(
        frames(&[(0.0, 10), (1.0, 10)]),
        &phrases,
        &AnalysisConfig::default(),
        |_| {},
    )
    .unwrap();
    assert_eq!(result.report.matches.len(), 1);
    assert!(result.report.matches[0].matched_keyframe_ids.is_empty());
    assert_eq!(result.report.warnings.len(), 1);
}

// ── Failure handling ───────────────────────────────────────────

#[test]
fn media_error_mid_stream_writes_nothing() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let samples = [(0.0, 0), (0.5, 200)];

    // The same stream without the failure does produce output.
    let clean_dir = tmp.path().join("clean");
    analyze_and_write(frames(&samples), &[], &AnalysisConfig::default(), &clean_dir).unwrap();
    assert!(clean_dir.join("product_listing.json").exists());
    assert!(clean_dir.join("keyframe.0.0.jpg").exists());

    let outdir = tmp.path().join("out");
    let mut stream = frames(&samples);
    stream.push(Err(MediaError::CorruptStream {
        path: PathBuf::from("clip.mp4"),
        message: "Invalid data found when processing input".into(),
    }));

    let err =
        analyze_and_write(stream, &[], &AnalysisConfig::default(), &outdir).unwrap_err();
    assert!(matches!(err, ShotlistError::Media(MediaError::CorruptStream { .. })));
    assert!(!outdir.exists());
}

// ── Output ─────────────────────────────────────────────────────

#[test]
fn repeated_runs_are_byte_identical() {
    let samples = [(0.0, 0), (1.0, 0), (2.0, 200), (3.0, 200), (4.0, 50)];
    let metadata = r#"[
        {"product_name": "Blue Mug", "start_time": 2.3, "end_time": 2.3, "raw_text": "this mug"},
        {"product_name": "Lamp", "start_time": 3.8, "end_time": 4.4}
    ]"#;
    let config = AnalysisConfig::default();

    let a = tempfile::tempdir().expect("failed to create tempdir");
    let b = tempfile::tempdir().expect("failed to create tempdir");
    run_to_dir(&samples, metadata, &config, a.path());
    run_to_dir(&samples, metadata, &config, b.path());

    for file in [
        "product_listing.json",
        "keyframes_index.csv",
        "phrase_keyframe_map.csv",
    ] {
        let first = std::fs::read(a.path().join(file)).unwrap();
        let second = std::fs::read(b.path().join(file)).unwrap();
        assert_eq!(first, second, "{file} differs between runs");
    }
}

#[test]
fn listing_records_still_files() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let listing = run_to_dir(
        &[(0.0, 0), (2.0, 200)],
        r#"[{"product_name": "Lamp", "start_time": 2.0, "end_time": 2.0}]"#,
        &AnalysisConfig::default(),
        tmp.path(),
    );

    assert_eq!(listing.keyframes.len(), 2);
    assert_eq!(listing.keyframes[1].file.as_deref(), Some("keyframe.1.2000.jpg"));
    assert!(tmp.path().join("keyframe.0.0.jpg").exists());
    assert!(tmp.path().join("keyframe.1.2000.jpg").exists());

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(tmp.path().join("product_listing.json")).unwrap())
            .unwrap();
    assert_eq!(json["products"][0]["product_name"], "Lamp");
    assert_eq!(json["products"][0]["matched_keyframe_ids"][0], 1);
    assert!(json["keyframes"][0]["score"].is_null());
}

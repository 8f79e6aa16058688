//! Integration tests for the output side: still selection, dry runs and
//! frame source failures.

use proptest::prelude::*;
use shotlist_align::{
    align, run_analysis, AlignConfig, AnalysisConfig, ListingStore, PhraseMention, ProductListing,
};
use shotlist_core::{Frame, FrameImage, KeyframeId, MediaError, PixelFormat};
use shotlist_media::{DecodeOptions, StillFormat, StillOptions, StillWriter, VideoDecoder};
use std::path::Path;

// ── Helpers ────────────────────────────────────────────────────

fn gray_frame(t: f64, v: u8) -> Frame {
    Frame::new(
        t,
        FrameImage::filled(64, 36, PixelFormat::Rgb8, &[v, v, v]).unwrap(),
    )
}

fn mention(name: &str, start: f64, end: f64) -> PhraseMention {
    PhraseMention {
        product_name: name.into(),
        start_time: start,
        end_time: end,
        raw_text: name.into(),
    }
}

/// Keyframes at 0, 2, 4 and 6 seconds.
fn four_scene_stream() -> Vec<Result<Frame, MediaError>> {
    [0u8, 200, 40, 240]
        .iter()
        .enumerate()
        .map(|(i, &v)| Ok(gray_frame(i as f64 * 2.0, v)))
        .collect()
}

// ── Still selection ────────────────────────────────────────────

#[test]
fn only_matched_writes_referenced_stills() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let phrases = [mention("Lamp", 2.0, 2.2), mention("Rug", 5.9, 6.1)];
    let result =
        run_analysis(four_scene_stream(), &phrases, &AnalysisConfig::default(), |_| {}).unwrap();
    assert_eq!(result.keyframes.len(), 4);

    let matched = result.report.matched_ids();
    let writer = StillWriter::new(
        tmp.path(),
        StillOptions {
            format: StillFormat::Png,
            ..Default::default()
        },
    );
    let written = writer
        .write_all(&result.keyframes, |id| matched.contains(&id))
        .unwrap();
    let ids: Vec<_> = written.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![KeyframeId(1), KeyframeId(3)]);

    assert!(tmp.path().join("keyframe.1.2000.png").exists());
    assert!(tmp.path().join("keyframe.3.6000.png").exists());
    assert!(!tmp.path().join("keyframe.0.0.png").exists());

    let keyframes = result.keyframes.with_source_paths(written);
    let listing = ProductListing::new(Path::new("clip.mp4"), &keyframes, &result.report);
    assert_eq!(listing.keyframes[0].file, None);
    assert_eq!(listing.keyframes[3].file.as_deref(), Some("keyframe.3.6000.png"));
}

#[test]
fn dry_run_writes_listing_but_no_stills() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let result = run_analysis(
        four_scene_stream(),
        &[mention("Lamp", 4.0, 4.0)],
        &AnalysisConfig::default(),
        |_| {},
    )
    .unwrap();

    let writer = StillWriter::new(
        tmp.path(),
        StillOptions {
            dry_run: true,
            prefix: "shot".into(),
            ..Default::default()
        },
    );
    let written = writer.write_all(&result.keyframes, |_| true).unwrap();
    assert_eq!(written.len(), 4);
    assert!(written.iter().all(|(_, path)| !path.exists()));

    let keyframes = result.keyframes.with_source_paths(written);
    let listing = ProductListing::new(Path::new("clip.mp4"), &keyframes, &result.report);
    ListingStore::new(tmp.path()).save_all(&listing).unwrap();

    let csv = std::fs::read_to_string(tmp.path().join("phrase_keyframe_map.csv")).unwrap();
    assert!(csv.lines().nth(1).unwrap().contains("shot.2.4000.jpg"));
}

// ── Frame source failures ──────────────────────────────────────

#[test]
fn missing_video_is_not_found() {
    let err = VideoDecoder::open("/no/such/clip.mp4", &DecodeOptions::default())
        .err()
        .expect("open should fail");
    assert!(matches!(err, MediaError::NotFound { .. }));
}

#[test]
fn unstartable_ffmpeg_is_spawn_error() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let video = tmp.path().join("clip.mp4");
    std::fs::write(&video, b"\x00\x00\x00\x18ftypmp42").unwrap();
    let options = DecodeOptions {
        ffmpeg_binary: Some(tmp.path().join("missing-ffmpeg")),
        ..Default::default()
    };
    let err = VideoDecoder::open(&video, &options)
        .err()
        .expect("spawn should fail");
    assert!(matches!(err, MediaError::Spawn { .. }));
}

// ── Properties ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn every_mention_gets_exactly_one_match(
        lumas in proptest::collection::vec(any::<u8>(), 1..30),
        spans in proptest::collection::vec((0u32..300, 0u32..40), 0..20),
    ) {
        let stream: Vec<Result<Frame, MediaError>> = lumas
            .iter()
            .enumerate()
            .map(|(i, &v)| Ok(gray_frame(i as f64 * 0.5, v)))
            .collect();
        let phrases: Vec<_> = spans
            .iter()
            .enumerate()
            .map(|(i, &(s, len))| {
                let start = s as f64 / 20.0;
                mention(&format!("p{i}"), start, start + len as f64 / 20.0)
            })
            .collect();

        let result = run_analysis(stream, &phrases, &AnalysisConfig::default(), |_| {}).unwrap();
        prop_assert!(!result.keyframes.is_empty());
        prop_assert_eq!(result.report.matches.len(), phrases.len());
        for m in &result.report.matches {
            for id in &m.matched_keyframe_ids {
                prop_assert!(result.keyframes.contains_id(*id));
            }
        }

        // Alignment alone agrees with the pipeline.
        let again = align(&phrases, &result.keyframes, &AlignConfig::default());
        prop_assert_eq!(again, result.report);
    }
}

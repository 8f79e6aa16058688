//! Keyframe still output.
//!
//! Writes selected keyframes to the output directory as JPEG or PNG files
//! named `<prefix>.<id>.<timestamp_ms>.<ext>`, optionally rescaled to a fixed
//! width with the aspect ratio kept.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use shotlist_core::{
    seconds_to_millis, FrameImage, Keyframe, KeyframeId, KeyframeSet, PixelFormat, Result,
    ShotlistError,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ── Format presets ──────────────────────────────────────────────

/// Still image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    #[default]
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
}

impl StillFormat {
    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Still output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StillOptions {
    /// File name prefix (default: "keyframe").
    pub prefix: String,
    pub format: StillFormat,
    /// Quality on FFmpeg's `-q:v` scale: 1 (best) to 31 (worst).
    pub quality: u8,
    /// Rescale to this width, keeping the aspect ratio.
    pub scale_width: Option<u32>,
    /// Log what would be written without touching the disk.
    pub dry_run: bool,
}

impl Default for StillOptions {
    fn default() -> Self {
        Self {
            prefix: "keyframe".into(),
            format: StillFormat::Jpeg,
            quality: 2,
            scale_width: None,
            dry_run: false,
        }
    }
}

impl StillOptions {
    /// Map the `-q:v` scale onto JPEG quality: 1 -> 100, 31 -> 10.
    pub fn jpeg_quality(&self) -> u8 {
        let q = self.quality.clamp(1, 31);
        100 - 3 * (q - 1)
    }

    /// PNG compression effort, lower for higher quality settings.
    pub fn png_compression(&self) -> CompressionType {
        match self.jpeg_quality() {
            90..=u8::MAX => CompressionType::Fast,
            50..=89 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

// ── Writer ───────────────────────────────────────────────────────

/// Writes keyframe stills into an output directory.
pub struct StillWriter {
    outdir: PathBuf,
    options: StillOptions,
}

impl StillWriter {
    pub fn new(outdir: impl Into<PathBuf>, options: StillOptions) -> Self {
        Self {
            outdir: outdir.into(),
            options,
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// File name for a keyframe, e.g. `keyframe.3.12500.jpg`.
    pub fn file_name(&self, keyframe: &Keyframe) -> String {
        format!(
            "{}.{}.{}.{}",
            self.options.prefix,
            keyframe.id,
            seconds_to_millis(keyframe.timestamp),
            self.options.format.extension()
        )
    }

    /// Write one keyframe, returning the path of the still.
    pub fn write(&self, keyframe: &Keyframe) -> Result<PathBuf> {
        let path = self.outdir.join(self.file_name(keyframe));

        if self.options.dry_run {
            info!(
                id = %keyframe.id,
                timestamp = keyframe.timestamp,
                path = %path.display(),
                "DRY RUN: would write keyframe still"
            );
            return Ok(path);
        }

        std::fs::create_dir_all(&self.outdir)?;
        let image = self.prepare(&keyframe.image)?;
        let mut writer = BufWriter::new(File::create(&path)?);

        match self.options.format {
            StillFormat::Jpeg => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut writer, self.options.jpeg_quality())
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(|e| image_error(&path, e))?;
            }
            StillFormat::Png => {
                PngEncoder::new_with_quality(
                    &mut writer,
                    self.options.png_compression(),
                    PngFilter::Adaptive,
                )
                .write_image(
                    image.as_bytes(),
                    image.width(),
                    image.height(),
                    image.color().into(),
                )
                .map_err(|e| image_error(&path, e))?;
            }
        }
        writer.flush()?;

        debug!(id = %keyframe.id, path = %path.display(), "Keyframe still written");
        Ok(path)
    }

    /// Write every keyframe accepted by `keep`, in id order.
    pub fn write_all(
        &self,
        keyframes: &KeyframeSet,
        keep: impl Fn(KeyframeId) -> bool,
    ) -> Result<Vec<(KeyframeId, PathBuf)>> {
        let mut written = Vec::new();
        for keyframe in keyframes.iter().filter(|k| keep(k.id)) {
            written.push((keyframe.id, self.write(keyframe)?));
        }
        info!(
            count = written.len(),
            outdir = %self.outdir.display(),
            dry_run = self.options.dry_run,
            "Keyframe stills saved"
        );
        Ok(written)
    }

    fn prepare(&self, frame: &FrameImage) -> Result<DynamicImage> {
        let (w, h) = (frame.width(), frame.height());
        let data = frame.data().to_vec();
        let image = match frame.format() {
            PixelFormat::Gray8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        }
        .ok_or_else(|| ShotlistError::Image(format!("{w}x{h} buffer does not fit image")))?;

        match self.options.scale_width {
            Some(target_w) if target_w > 0 && target_w != w => {
                let scale = target_w as f64 / w as f64;
                let target_h = ((h as f64 * scale).round() as u32).max(1);
                Ok(image.resize_exact(target_w, target_h, FilterType::CatmullRom))
            }
            _ => Ok(image),
        }
    }
}

fn image_error(path: &Path, e: image::ImageError) -> ShotlistError {
    ShotlistError::Image(format!("failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe(id: u64, timestamp: f64) -> Keyframe {
        Keyframe {
            id: KeyframeId(id),
            timestamp,
            image: FrameImage::filled(64, 32, PixelFormat::Rgb8, &[10, 200, 30]).unwrap(),
            distance_score: f64::INFINITY,
            source_path: None,
        }
    }

    #[test]
    fn test_quality_mapping() {
        let mut options = StillOptions::default();
        assert_eq!(options.jpeg_quality(), 97);
        options.quality = 1;
        assert_eq!(options.jpeg_quality(), 100);
        options.quality = 31;
        assert_eq!(options.jpeg_quality(), 10);
        options.quality = 200;
        assert_eq!(options.jpeg_quality(), 10);
    }

    #[test]
    fn test_file_name() {
        let writer = StillWriter::new("/tmp/out", StillOptions::default());
        assert_eq!(writer.file_name(&keyframe(3, 12.5)), "keyframe.3.12500.jpg");
    }

    #[test]
    fn test_write_jpeg_with_scale() {
        let tmp = tempfile::tempdir().expect("failed to create tempdir");
        let writer = StillWriter::new(
            tmp.path(),
            StillOptions {
                scale_width: Some(32),
                ..Default::default()
            },
        );
        let path = writer.write(&keyframe(0, 0.0)).unwrap();
        assert!(path.exists());

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn test_write_png() {
        let tmp = tempfile::tempdir().expect("failed to create tempdir");
        let writer = StillWriter::new(
            tmp.path(),
            StillOptions {
                format: StillFormat::Png,
                prefix: "kf".into(),
                ..Default::default()
            },
        );
        let path = writer.write(&keyframe(1, 2.0)).unwrap();
        assert_eq!(path.file_name().unwrap(), "kf.1.2000.png");

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 200, 30]);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tmp = tempfile::tempdir().expect("failed to create tempdir");
        let outdir = tmp.path().join("frames");
        let writer = StillWriter::new(
            &outdir,
            StillOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let path = writer.write(&keyframe(0, 0.0)).unwrap();
        assert!(!path.exists());
        assert!(!outdir.exists());
    }

    #[test]
    fn test_write_all_filters() {
        let tmp = tempfile::tempdir().expect("failed to create tempdir");
        let set = KeyframeSet::new(vec![keyframe(0, 0.0), keyframe(1, 2.0), keyframe(2, 4.0)])
            .unwrap();
        let writer = StillWriter::new(tmp.path(), StillOptions::default());
        let written = writer.write_all(&set, |id| id != KeyframeId(1)).unwrap();
        let ids: Vec<_> = written.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![KeyframeId(0), KeyframeId(2)]);
    }
}

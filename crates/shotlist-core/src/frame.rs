//! Frame types handed from the frame source to the detector.
//!
//! A [`Frame`] is deliberately minimal: a timestamp plus a packed pixel grid.
//! Nothing downstream of the decoder depends on an imaging library.

use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit grayscale
    Gray8,
    /// 8-bit RGB (24 bits per pixel), what the decoder emits
    #[default]
    Rgb8,
    /// 8-bit RGBA (32 bits per pixel)
    Rgba8,
}

impl PixelFormat {
    /// Channels per pixel (the channel depth of the grid).
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Calculate total bytes needed for a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels()
    }
}

/// A packed, row-major pixel grid without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameImage {
    /// Wrap raw pixel data, checking that it matches the declared geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidFrame(format!(
                "empty frame dimensions {width}x{height}"
            )));
        }
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(MediaError::InvalidFrame(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel has the same value.
    ///
    /// `pixel` must hold one byte per channel of `format`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> MediaResult<Self> {
        if pixel.len() != format.channels() {
            return Err(MediaError::InvalidFrame(format!(
                "{format:?} pixel needs {} channels, got {}",
                format.channels(),
                pixel.len()
            )));
        }
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(format.frame_size(width, height))
            .collect();
        Self::new(width, height, format, data)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw packed pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image, returning its pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// BT.601 luma of the pixel at `(x, y)`.
    #[inline]
    fn luma_at(&self, x: usize, y: usize) -> u32 {
        let channels = self.format.channels();
        let base = (y * self.width as usize + x) * channels;
        match self.format {
            PixelFormat::Gray8 => self.data[base] as u32,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                let r = self.data[base] as u32;
                let g = self.data[base + 1] as u32;
                let b = self.data[base + 2] as u32;
                (r * 299 + g * 587 + b * 114) / 1000
            }
        }
    }

    /// Block-average the luminance onto a `target_width` x `target_height` grid.
    ///
    /// Each output cell averages the source pixels it covers, so the result is
    /// independent of the source resolution. Sources smaller than the target
    /// are upsampled by repeating pixels.
    pub fn luma_thumbnail(&self, target_width: u32, target_height: u32) -> LumaThumbnail {
        let w = self.width as usize;
        let h = self.height as usize;
        let tw = target_width.max(1) as usize;
        let th = target_height.max(1) as usize;

        let mut data = Vec::with_capacity(tw * th);
        for by in 0..th {
            let y_start = (by * h / th).min(h - 1);
            let y_end = ((by + 1) * h / th).clamp(y_start + 1, h);
            for bx in 0..tw {
                let x_start = (bx * w / tw).min(w - 1);
                let x_end = ((bx + 1) * w / tw).clamp(x_start + 1, w);

                let mut sum = 0u64;
                let mut count = 0u64;
                for py in y_start..y_end {
                    for px in x_start..x_end {
                        sum += u64::from(self.luma_at(px, py));
                        count += 1;
                    }
                }
                data.push((sum / count) as u8);
            }
        }

        LumaThumbnail {
            width: tw as u32,
            height: th as u32,
            data,
        }
    }
}

/// A decoded, sampled video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation timestamp in seconds
    pub timestamp: f64,
    pub image: FrameImage,
}

impl Frame {
    pub fn new(timestamp: f64, image: FrameImage) -> Self {
        Self { timestamp, image }
    }
}

/// Downsampled 8-bit luminance used for frame differencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaThumbnail {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LumaThumbnail {
    /// Mean absolute difference against another thumbnail.
    ///
    /// Returns a value in `[0.0, 1.0]` where 0 = identical, 1 = black vs white.
    /// Returns `None` if the thumbnails have different dimensions.
    pub fn mean_absolute_difference(&self, other: &LumaThumbnail) -> Option<f64> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        if self.data.is_empty() {
            return Some(0.0);
        }

        let total: u64 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
            .sum();

        Some(total as f64 / (self.data.len() as f64 * 255.0))
    }
}

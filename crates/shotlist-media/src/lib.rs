//! Shotlist Media - FFmpeg integration for frame sampling and still output
//!
//! This crate handles:
//! - Sampling decoded frames from a video at a fixed rate
//! - Writing selected keyframes to disk as JPEG/PNG stills

pub mod decoder;
pub mod stills;

pub use decoder::{frame_from_output, DecodeOptions, VideoDecoder};
pub use stills::{StillFormat, StillOptions, StillWriter};

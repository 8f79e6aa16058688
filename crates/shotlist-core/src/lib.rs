//! Shotlist Core - Foundation types for keyframe/product alignment
//!
//! This crate provides the fundamental types used throughout Shotlist:
//! - Time spans and timecode formatting
//! - Decoded frames and luminance thumbnails
//! - Selected keyframes and the keyframe set
//! - The media/metadata error taxonomy

pub mod error;
pub mod frame;
pub mod keyframe;
pub mod time;

pub use error::{MediaError, MediaResult, MetadataError, Result, ShotlistError};
pub use frame::{Frame, FrameImage, LumaThumbnail, PixelFormat};
pub use keyframe::{Keyframe, KeyframeCandidate, KeyframeId, KeyframeIds, KeyframeSet};
pub use time::{format_timecode, seconds_to_millis, TimeSpan};

//! Integration test crate for Shotlist.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives the media, alignment and output crates together using
//! synthetic frame streams in place of a real video.

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod output;

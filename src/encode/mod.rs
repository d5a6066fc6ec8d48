//! Encoding: hand an ordered frame list to the system `ffmpeg`.

/// `ffmpeg` invocation, output naming and configuration.
pub mod ffmpeg;
/// Transient concat-demuxer input list.
pub mod manifest;

//! Turn a directory of photos into a timelapse video.
//!
//! Frames are ordered by capture time (EXIF `DateTimeOriginal`, falling back to the file's
//! modification time), optionally captioned with that time, and handed to the system `ffmpeg`
//! through a concat-demuxer manifest.
#![forbid(unsafe_code)]

mod foundation;

pub mod caption;
pub mod catalog;
pub mod encode;
pub mod pipeline;
pub mod scale;
pub mod timestamp;

pub use caption::{CaptionCompositor, CaptionOutcome, CaptionStyle, FontOrigin};
pub use catalog::{CatalogSummary, FrameCatalog, FrameDescriptor, OrderKey, build_catalog};
pub use encode::ffmpeg::{DrawtextOverlay, EncodeConfig, EncodeReport, encode_frames};
pub use foundation::error::{TimelapseError, TimelapseResult};
pub use foundation::token::RunToken;
pub use pipeline::{OverlayTimestamp, RunOptions, RunReport, ScaleChoice, run};
pub use scale::{ScaleSuggestion, suggest_scale};
pub use timestamp::{ResolvedTimestamp, TimestampSource, resolve_capture_time};

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
mod test_support;

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone as _};

use crate::{
    caption::{CaptionCompositor, CaptionStyle, FontOrigin},
    catalog::{FrameCatalog, OrderKey, build_catalog},
    encode::ffmpeg::{DrawtextOverlay, EncodeConfig, encode_frames},
    foundation::{error::TimelapseResult, token::RunToken},
    scale::{ScaleSuggestion, suggest_scale},
};

/// How the encode picks its `scale` filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleChoice {
    /// Keep whatever `EncodeConfig::scale` already says.
    #[default]
    None,
    /// Use the catalog's most common dimensions.
    Auto,
    /// Explicit `W:H`.
    Fixed(String),
}

/// Running clock drawn by the encoder instead of per-frame captions.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayTimestamp {
    pub font_file: PathBuf,
    #[serde(default = "default_overlay_font_size")]
    pub font_size: u32,
}

fn default_overlay_font_size() -> u32 {
    24
}

/// Everything one `run` needs; loadable from JSON.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub source_dir: PathBuf,
    pub order: OrderKey,
    /// Where transient files (manifest, captioned frames) are written.
    pub work_dir: PathBuf,
    pub scale: ScaleChoice,
    /// Burn the capture time into each frame before encoding.
    pub caption: Option<CaptionStyle>,
    pub overlay_timestamp: Option<OverlayTimestamp>,
    pub encode: EncodeConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            order: OrderKey::default(),
            work_dir: PathBuf::from("."),
            scale: ScaleChoice::default(),
            caption: None,
            overlay_timestamp: None,
            encode: EncodeConfig::default(),
        }
    }
}

impl RunOptions {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunReport {
    /// Nothing to encode; no files were written.
    Empty,
    Encoded {
        out_path: PathBuf,
        frames_encoded: usize,
        frames_skipped: usize,
        scale: Option<ScaleSuggestion>,
        /// Captioned frames left on disk because `delete_temp_files` was off.
        caption_dir: Option<PathBuf>,
        /// Caption font actually used; `None` when captioning was off.
        /// [`FontOrigin::Unavailable`] means the frames went out without captions.
        font: Option<FontOrigin>,
    },
}

pub fn caption_dir_name(token: &RunToken) -> String {
    format!(".timelapse_frames_{token}")
}

/// Catalog `options.source_dir`, optionally caption, then encode.
#[tracing::instrument(skip(options), fields(source = %options.source_dir.display()))]
pub fn run(options: &RunOptions) -> TimelapseResult<RunReport> {
    let catalog = build_catalog(&options.source_dir, options.order)?;
    if catalog.is_empty() {
        tracing::warn!(
            "no images found in '{}'; nothing to encode",
            options.source_dir.display()
        );
        return Ok(RunReport::Empty);
    }

    let scale = resolve_scale(&options.scale, &catalog)?;
    let mut encode = options.encode.clone();
    if let Some(s) = scale {
        encode.scale = Some(s.to_string());
    }
    if let Some(overlay) = &options.overlay_timestamp {
        encode.overlay = drawtext_overlay(overlay, catalog.first_timestamp());
    }
    encode.validate()?;

    let token = RunToken::generate();
    let Some(style) = options.caption.clone() else {
        let report = encode_frames(&catalog.paths(), &encode, &options.work_dir, &token)?;
        return Ok(RunReport::Encoded {
            out_path: report.out_path,
            frames_encoded: report.frames,
            frames_skipped: 0,
            scale,
            caption_dir: None,
            font: None,
        });
    };

    let compositor = CaptionCompositor::new(style)?;
    let caption_dir = options.work_dir.join(caption_dir_name(&token));
    let outcome = compositor.render_catalog(&catalog, &caption_dir)?;

    if outcome.paths.is_empty() {
        tracing::warn!("every frame failed to caption; nothing to encode");
        remove_caption_dir(&caption_dir);
        return Ok(RunReport::Empty);
    }

    let encoded = encode_frames(&outcome.paths, &encode, &options.work_dir, &token);
    let retained = if encode.delete_temp_files {
        remove_caption_dir(&caption_dir);
        None
    } else {
        tracing::info!("keeping captioned frames in '{}'", caption_dir.display());
        Some(caption_dir)
    };
    let report = encoded?;

    Ok(RunReport::Encoded {
        out_path: report.out_path,
        frames_encoded: report.frames,
        frames_skipped: outcome.skipped.len(),
        scale,
        caption_dir: retained,
        font: Some(compositor.font_origin().clone()),
    })
}

fn resolve_scale(
    choice: &ScaleChoice,
    catalog: &FrameCatalog,
) -> TimelapseResult<Option<ScaleSuggestion>> {
    match choice {
        ScaleChoice::None => Ok(None),
        ScaleChoice::Fixed(s) => s.parse().map(Some),
        ScaleChoice::Auto => {
            let suggestion = suggest_scale(catalog);
            match suggestion {
                Some(s) => tracing::info!("auto scale: {s}"),
                None => tracing::warn!("no frame has readable dimensions; encoding unscaled"),
            }
            Ok(suggestion)
        }
    }
}

fn drawtext_overlay(
    overlay: &OverlayTimestamp,
    first: Option<NaiveDateTime>,
) -> Option<DrawtextOverlay> {
    let Some(first) = first else {
        tracing::warn!("first frame has no timestamp; dropping the timestamp overlay");
        return None;
    };
    let mut drawtext = DrawtextOverlay::new(&overlay.font_file, local_epoch(first));
    drawtext.font_size = overlay.font_size;
    Some(drawtext)
}

/// Unix seconds of a local wall-clock time; a skipped local time is read as UTC.
fn local_epoch(t: NaiveDateTime) -> i64 {
    chrono::Local
        .from_local_datetime(&t)
        .earliest()
        .map(|d| d.timestamp())
        .unwrap_or_else(|| t.and_utc().timestamp())
}

fn remove_caption_dir(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!("removed '{}'", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove '{}': {e}", dir.display()),
    }
}

impl From<ScaleSuggestion> for ScaleChoice {
    fn from(s: ScaleSuggestion) -> Self {
        Self::Fixed(s.to_string())
    }
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;

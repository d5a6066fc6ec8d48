use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{
    encode::manifest::EncodeManifest,
    foundation::{
        error::{TimelapseError, TimelapseResult},
        token::RunToken,
    },
    scale::ScaleSuggestion,
};

/// Encoder settings. Codec, preset and pixel format are passed to `ffmpeg` verbatim.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Requested output path; collisions get a `_N` suffix (see [`resolve_output_path`]).
    pub out_path: PathBuf,
    /// Input frame rate.
    pub fps: f64,
    /// Rate-control factor: lower is better quality and larger output.
    pub crf: u32,
    pub preset: String,
    /// Optional `W:H` scale filter.
    pub scale: Option<String>,
    pub codec: String,
    pub pix_fmt: String,
    /// Remove captioned temporaries after encoding.
    pub delete_temp_files: bool,
    /// Encoder executable.
    pub ffmpeg_bin: PathBuf,
    /// Running clock burned in by `ffmpeg` itself.
    pub overlay: Option<DrawtextOverlay>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            out_path: PathBuf::from("timelapse.mp4"),
            fps: 30.0,
            crf: 23,
            preset: "medium".to_string(),
            scale: None,
            codec: "libx264".to_string(),
            pix_fmt: "yuv420p".to_string(),
            delete_temp_files: true,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            overlay: None,
        }
    }
}

impl EncodeConfig {
    pub fn validate(&self) -> TimelapseResult<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(TimelapseError::validation("encode fps must be finite and > 0"));
        }
        if self.crf > 63 {
            return Err(TimelapseError::validation("encode crf must be <= 63"));
        }
        for (name, value) in [
            ("codec", &self.codec),
            ("preset", &self.preset),
            ("pix_fmt", &self.pix_fmt),
        ] {
            if value.trim().is_empty() {
                return Err(TimelapseError::validation(format!(
                    "encode {name} must be non-empty"
                )));
            }
        }
        if let Some(scale) = &self.scale {
            scale.parse::<ScaleSuggestion>()?;
        }
        if self.out_path.file_name().is_none() {
            return Err(TimelapseError::validation(
                "encode out_path must name a file",
            ));
        }
        Ok(())
    }

    pub fn with_out_path(mut self, out_path: impl Into<PathBuf>) -> Self {
        self.out_path = out_path.into();
        self
    }
}

/// `drawtext` filter that renders capture time as `start_epoch + pts`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DrawtextOverlay {
    pub font_file: PathBuf,
    /// Unix seconds of the first frame.
    pub start_epoch: i64,
    pub font_size: u32,
    pub x: i32,
    pub y: i32,
}

impl DrawtextOverlay {
    pub fn new(font_file: impl Into<PathBuf>, start_epoch: i64) -> Self {
        Self {
            font_file: font_file.into(),
            start_epoch,
            font_size: 24,
            x: 10,
            y: 10,
        }
    }

    pub fn filter(&self) -> String {
        format!(
            "drawtext=fontfile={}:text='%{{pts\\:localtime\\:{}}}':fontcolor=white:fontsize={}:box=1:boxcolor=black@0.5:x={}:y={}",
            quote_filter_value(&self.font_file.to_string_lossy()),
            self.start_epoch,
            self.font_size,
            self.x,
            self.y
        )
    }
}

/// Quote a filter option value for both parsing passes: `\` and `:` are backslash-escaped for
/// the option parser, then the whole value is single-quoted with `'` as `'\''`.
fn quote_filter_value(v: &str) -> String {
    let escaped = v.replace('\\', r"\\").replace(':', r"\:");
    format!("'{}'", escaped.replace('\'', r"'\''"))
}

/// Comma-joined `-vf` chain, scale first.
pub fn video_filters(cfg: &EncodeConfig) -> Option<String> {
    let mut filters = Vec::new();
    if let Some(scale) = &cfg.scale {
        filters.push(format!("scale={scale}"));
    }
    if let Some(overlay) = &cfg.overlay {
        filters.push(overlay.filter());
    }
    (!filters.is_empty()).then(|| filters.join(","))
}

/// Full `ffmpeg` argument list, excluding the program name.
pub fn encoder_args(cfg: &EncodeConfig, manifest: &Path, out_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "concat",
        "-safe",
        "0",
        "-r",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(cfg.fps.to_string().into());
    args.push("-i".into());
    args.push(manifest.into());

    if let Some(vf) = video_filters(cfg) {
        args.push("-vf".into());
        args.push(vf.into());
    }

    for (flag, value) in [
        ("-c:v", cfg.codec.clone()),
        ("-crf", cfg.crf.to_string()),
        ("-preset", cfg.preset.clone()),
        ("-pix_fmt", cfg.pix_fmt.clone()),
    ] {
        args.push(flag.into());
        args.push(value.into());
    }
    args.push(out_path.into());
    args
}

/// First path among `requested`, `stem_1.ext`, `stem_2.ext`, ... that does not exist yet.
///
/// Checked once; a concurrent writer between this call and the encode can still collide.
pub fn resolve_output_path(requested: &Path) -> PathBuf {
    if !requested.exists() {
        return requested.to_path_buf();
    }

    let stem = requested
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = requested
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u64;
    loop {
        let candidate = requested.with_file_name(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> TimelapseResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeReport {
    pub out_path: PathBuf,
    pub frames: usize,
}

/// Encode `frames` (already in display order) into a video.
///
/// The manifest is written into `work_dir` right before `ffmpeg` starts and removed as soon as it
/// exits. A spawn failure or a non-zero exit is returned as [`TimelapseError::Encode`]; there is no
/// retry.
#[tracing::instrument(skip(frames, cfg), fields(frames = frames.len()))]
pub fn encode_frames(
    frames: &[PathBuf],
    cfg: &EncodeConfig,
    work_dir: &Path,
    token: &RunToken,
) -> TimelapseResult<EncodeReport> {
    cfg.validate()?;
    if frames.is_empty() {
        return Err(TimelapseError::validation("no frames to encode"));
    }
    ensure_parent_dir(&cfg.out_path)?;

    let out_path = resolve_output_path(&cfg.out_path);
    if out_path != cfg.out_path {
        tracing::info!(
            "'{}' exists; writing to '{}'",
            cfg.out_path.display(),
            out_path.display()
        );
    }

    let manifest = EncodeManifest::write(work_dir, token, frames)?;
    let args = encoder_args(cfg, manifest.path(), &out_path);
    tracing::info!("running: {} {:?}", cfg.ffmpeg_bin.display(), args);

    let output = Command::new(&cfg.ffmpeg_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    drop(manifest);

    let output = output.map_err(|e| {
        TimelapseError::encode(format!(
            "failed to spawn '{}' (is it installed and on PATH?): {e}",
            cfg.ffmpeg_bin.display()
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TimelapseError::encode(format!(
            "'{}' exited with status {}: {}",
            cfg.ffmpeg_bin.display(),
            output.status,
            stderr.trim()
        )));
    }

    tracing::info!("encoded {} frame(s) into '{}'", frames.len(), out_path.display());
    Ok(EncodeReport {
        out_path,
        frames: frames.len(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;

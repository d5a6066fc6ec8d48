//! Frame catalog: the ordered set of images that becomes the video.
//!
//! [`build_catalog`] scans one directory, resolves a capture time and pixel size for every
//! candidate image, and returns a [`FrameCatalog`] sorted by the requested [`OrderKey`].
//!
//! Ordering contract:
//! - candidates are first enumerated lexicographically by filename
//! - the final sort is stable, so equal keys keep enumeration order
//! - descriptors without a timestamp sort after all timestamped ones

use std::{
    cmp::Ordering,
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::NaiveDateTime;

use crate::{
    foundation::error::{TimelapseError, TimelapseResult},
    timestamp::{TimestampSource, resolve_capture_time},
};

pub mod summary;

pub use summary::{AxisStats, CatalogSummary};

/// Raster formats picked up from the source directory (matched case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Sort key for a catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKey {
    #[default]
    Timestamp,
    Filename,
}

/// One discovered image.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameDescriptor {
    pub filename: String,
    pub path: PathBuf,
    pub timestamp: Option<NaiveDateTime>,
    pub timestamp_source: TimestampSource,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `width / height` rounded to 4 decimals; present iff both dimensions are.
    pub aspect_ratio: Option<f64>,
}

impl FrameDescriptor {
    /// Descriptor with the given dimensions and a derived aspect ratio.
    pub fn new(
        filename: impl Into<String>,
        path: impl Into<PathBuf>,
        timestamp: Option<NaiveDateTime>,
        timestamp_source: TimestampSource,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        let (width, height, aspect_ratio) = match dimensions {
            Some((w, h)) if w > 0 && h > 0 => (Some(w), Some(h), Some(aspect_ratio(w, h))),
            _ => (None, None, None),
        };
        Self {
            filename: filename.into(),
            path: path.into(),
            timestamp,
            timestamp_source,
            width,
            height,
            aspect_ratio,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f64 {
    ((width as f64 / height as f64) * 10_000.0).round() / 10_000.0
}

/// A recoverable problem found while cataloguing one file.
#[derive(Debug)]
pub struct CatalogIssue {
    pub filename: String,
    pub error: TimelapseError,
}

impl serde::Serialize for CatalogIssue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("CatalogIssue", 2)?;
        s.serialize_field("filename", &self.filename)?;
        s.serialize_field("error", &self.error.to_string())?;
        s.end()
    }
}

/// Ordered frame descriptors plus the key they are ordered by.
#[derive(Debug, serde::Serialize)]
pub struct FrameCatalog {
    order: OrderKey,
    frames: Vec<FrameDescriptor>,
    summary: CatalogSummary,
    issues: Vec<CatalogIssue>,
}

impl FrameCatalog {
    /// Order `frames` by `order` and compute the summary.
    ///
    /// Input order does not matter: frames are first put into filename order so the result is
    /// identical for any permutation of the same descriptors.
    pub fn from_frames(mut frames: Vec<FrameDescriptor>, order: OrderKey) -> TimelapseResult<Self> {
        frames.sort_by(|a, b| a.filename.cmp(&b.filename));
        if let Some(dup) = frames.windows(2).find(|w| w[0].filename == w[1].filename) {
            return Err(TimelapseError::validation(format!(
                "duplicate frame filename '{}'",
                dup[0].filename
            )));
        }
        sort_frames(&mut frames, order);
        let summary = CatalogSummary::from_frames(&frames);
        Ok(Self {
            order,
            frames,
            summary,
            issues: Vec::new(),
        })
    }

    pub fn order(&self) -> OrderKey {
        self.order
    }

    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn summary(&self) -> &CatalogSummary {
        &self.summary
    }

    /// Recoverable problems found while building, in enumeration order.
    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }

    /// Source paths in catalog order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }

    /// Timestamp of the first frame, if it has one.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.frames.first().and_then(|f| f.timestamp)
    }
}

/// Stable sort by `order`; `None` timestamps go last.
pub fn sort_frames(frames: &mut [FrameDescriptor], order: OrderKey) {
    match order {
        OrderKey::Filename => frames.sort_by(|a, b| a.filename.cmp(&b.filename)),
        OrderKey::Timestamp => frames.sort_by(|a, b| match (a.timestamp, b.timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }
}

/// `true` if `name` carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Image filenames in `dir`, sorted lexicographically.
pub fn list_candidates(dir: &Path) -> TimelapseResult<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list source directory '{}'", dir.display()))?;

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!("skipping non-UTF-8 name in '{}'", dir.display());
            continue;
        };
        if is_image_name(&name) && entry.path().is_file() {
            names.insert(name);
        }
    }
    Ok(names.into_iter().collect())
}

/// Pixel size from the image header.
pub fn read_dimensions(path: &Path) -> TimelapseResult<(u32, u32)> {
    let (w, h) = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| TimelapseError::dimension_read(path, e))?
        .into_dimensions()
        .map_err(|e| TimelapseError::dimension_read(path, e))?;
    if w == 0 || h == 0 {
        return Err(TimelapseError::dimension_read(
            path,
            format!("degenerate size {w}x{h}"),
        ));
    }
    Ok((w, h))
}

/// Scan `dir` and build an ordered catalog.
///
/// Only a directory that cannot be listed is an error. Per-file problems are logged, kept in
/// [`FrameCatalog::issues`], and leave the affected fields as `None`.
#[tracing::instrument]
pub fn build_catalog(dir: &Path, order: OrderKey) -> TimelapseResult<FrameCatalog> {
    let names = list_candidates(dir)?;
    if names.is_empty() {
        tracing::warn!("no images found in '{}'", dir.display());
    }

    let mut frames = Vec::with_capacity(names.len());
    let mut issues = Vec::new();

    for name in names {
        let path = dir.join(&name);

        let ts = resolve_capture_time(&path);
        issues.extend(ts.failures.into_iter().map(|error| CatalogIssue {
            filename: name.clone(),
            error,
        }));

        let dimensions = match read_dimensions(&path) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!("{e}");
                issues.push(CatalogIssue {
                    filename: name.clone(),
                    error: e,
                });
                None
            }
        };

        let frame = FrameDescriptor::new(name, path, ts.value, ts.source, dimensions);
        tracing::debug!(
            file = %frame.filename,
            timestamp = ?frame.timestamp,
            source = ?frame.timestamp_source,
            width = ?frame.width,
            height = ?frame.height,
            "catalogued frame"
        );
        frames.push(frame);
    }

    let mut catalog = FrameCatalog::from_frames(frames, order)?;
    catalog.issues = issues;
    tracing::info!("image resolution summary:\n{}", catalog.summary);
    Ok(catalog)
}

#[cfg(test)]
#[path = "../tests/unit/catalog.rs"]
mod tests;

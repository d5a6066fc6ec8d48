//! Burned-in timestamp captions.
//!
//! Each frame is decoded, a caption is rasterised on top of it with `resvg`, and the result is
//! written as a sequentially numbered JPEG. The caption is an SVG text document shaped by `usvg`
//! against a font database that holds either the configured font file or the system fonts.

use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use chrono::NaiveDateTime;
use resvg::tiny_skia;

use crate::{
    catalog::FrameCatalog,
    foundation::error::{TimelapseError, TimelapseResult},
};

mod pixels;

use pixels::{demultiply_rgba8_in_place, premultiply_rgba8_in_place};

/// Placeholder caption for frames without a timestamp.
pub const UNKNOWN_CAPTION: &str = "Unknown";

/// Caption timestamp layout.
pub const CAPTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MIN_INDEX_WIDTH: usize = 5;

/// Caption styling. Passed to [`CaptionCompositor::new`]; nothing here is global.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Font file to load. `None` (or a file that fails to load) selects a system font.
    pub font_path: Option<PathBuf>,
    /// Font size as a fraction of image height.
    pub font_size_ratio: f32,
    /// Distance in pixels from the left and bottom edges to the caption box.
    pub padding: u32,
    /// Outline reach in pixels; `0` disables the outline.
    pub outline_width: u32,
    /// Straight-alpha RGBA.
    pub fill_rgba: [u8; 4],
    /// Straight-alpha RGBA.
    pub outline_rgba: [u8; 4],
    /// JPEG quality of the written frames (1..=100).
    pub jpeg_quality: u8,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_path: Some(PathBuf::from(
                "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            )),
            font_size_ratio: 0.05,
            padding: 20,
            outline_width: 2,
            fill_rgba: [255, 255, 255, 255],
            outline_rgba: [0, 0, 0, 255],
            jpeg_quality: 95,
        }
    }
}

impl CaptionStyle {
    pub fn validate(&self) -> TimelapseResult<()> {
        if !self.font_size_ratio.is_finite() || self.font_size_ratio <= 0.0 {
            return Err(TimelapseError::validation(
                "caption font_size_ratio must be finite and > 0",
            ));
        }
        if self.font_size_ratio > 1.0 {
            return Err(TimelapseError::validation(
                "caption font_size_ratio must be <= 1",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(TimelapseError::validation(
                "caption jpeg_quality must be in 1..=100",
            ));
        }
        if self.outline_width > 16 {
            return Err(TimelapseError::validation(
                "caption outline_width must be <= 16",
            ));
        }
        Ok(())
    }

    /// Font size in pixels for an image of `image_height`.
    pub fn font_size_for(&self, image_height: u32) -> f32 {
        (image_height as f32 * self.font_size_ratio).max(1.0)
    }
}

/// Caption text for a frame.
pub fn caption_text(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(ts) => ts.format(CAPTION_TIME_FORMAT).to_string(),
        None => UNKNOWN_CAPTION.to_string(),
    }
}

/// `frame_{index}.jpg`, zero-padded so lexicographic order equals index order for `total` frames.
pub fn frame_file_name(index: usize, total: usize) -> String {
    let width = total.to_string().len().max(MIN_INDEX_WIDTH);
    format!("frame_{index:0width$}.jpg")
}

/// Where the caption font came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontOrigin {
    Configured(PathBuf),
    System,
    /// No usable face: frames are written without a caption.
    Unavailable,
}

/// Caption bounding box in image pixels, after placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptionBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CaptionBox {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

struct CaptionLayout {
    tree: usvg::Tree,
    placed: CaptionBox,
    shift: tiny_skia::Transform,
}

/// A frame that could not be captioned and is left out of the output.
#[derive(Debug)]
pub struct SkippedFrame {
    pub index: usize,
    pub source: PathBuf,
    pub error: TimelapseError,
}

/// Result of [`CaptionCompositor::render_catalog`].
#[derive(Debug, Default)]
pub struct CaptionOutcome {
    /// Written frames, in catalog order.
    pub paths: Vec<PathBuf>,
    pub skipped: Vec<SkippedFrame>,
}

pub struct CaptionCompositor {
    style: CaptionStyle,
    origin: FontOrigin,
    family: Option<String>,
    options: usvg::Options<'static>,
}

impl std::fmt::Debug for CaptionCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionCompositor")
            .field("style", &self.style)
            .field("origin", &self.origin)
            .field("family", &self.family)
            .finish()
    }
}

impl CaptionCompositor {
    /// Validate `style` and resolve its font.
    pub fn new(style: CaptionStyle) -> TimelapseResult<Self> {
        style.validate()?;
        let (db, origin) = load_font_db(style.font_path.as_deref());
        let family = pick_family(&db);
        let origin = if family.is_some() {
            origin
        } else {
            tracing::warn!("no usable font found; frames will be written without captions");
            FontOrigin::Unavailable
        };

        let mut options = usvg::Options::default();
        options.fontdb = Arc::new(db);

        Ok(Self {
            style,
            origin,
            family,
            options,
        })
    }

    pub fn style(&self) -> &CaptionStyle {
        &self.style
    }

    pub fn font_origin(&self) -> &FontOrigin {
        &self.origin
    }

    /// Shape `text` for an image of `image_width`x`image_height` and return where it lands.
    ///
    /// `None` when no font is available or the text shapes to nothing.
    pub fn measure(
        &self,
        text: &str,
        image_width: u32,
        image_height: u32,
    ) -> TimelapseResult<Option<CaptionBox>> {
        Ok(self
            .layout(text, image_width, image_height)?
            .map(|layout| layout.placed))
    }

    fn layout(
        &self,
        text: &str,
        image_width: u32,
        image_height: u32,
    ) -> TimelapseResult<Option<CaptionLayout>> {
        let Some(family) = self.family.as_deref() else {
            return Ok(None);
        };

        let font_size = self.style.font_size_for(image_height);
        let svg = caption_svg(text, family, font_size, &self.style, image_width, image_height);
        let tree = usvg::Tree::from_str(&svg, &self.options)
            .map_err(|e| TimelapseError::validation(format!("caption svg rejected: {e}")))?;

        if !tree.root().has_children() {
            return Ok(None);
        }
        let bbox = tree.root().abs_bounding_box();
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Ok(None);
        }

        // Bottom-left of the box sits `padding` px in from the left and bottom edges.
        let pad = self.style.padding as f32;
        let placed = CaptionBox {
            left: pad,
            top: image_height as f32 - pad - bbox.height(),
            width: bbox.width(),
            height: bbox.height(),
        };
        let shift = tiny_skia::Transform::from_translate(
            placed.left - bbox.left(),
            placed.top - bbox.top(),
        );
        Ok(Some(CaptionLayout {
            tree,
            placed,
            shift,
        }))
    }

    /// Draw the caption onto `img` in place. Returns `false` when there was nothing to draw.
    pub fn caption_image(&self, img: &mut image::RgbaImage, text: &str) -> TimelapseResult<bool> {
        let (width, height) = img.dimensions();
        let Some(layout) = self.layout(text, width, height)? else {
            return Ok(false);
        };

        let size = tiny_skia::IntSize::from_wh(width, height)
            .ok_or_else(|| TimelapseError::validation("caption target has zero size"))?;
        let mut data = std::mem::take(img).into_raw();
        premultiply_rgba8_in_place(&mut data);
        let mut pixmap = tiny_skia::Pixmap::from_vec(data, size)
            .ok_or_else(|| TimelapseError::validation("caption target buffer size mismatch"))?;

        resvg::render(&layout.tree, layout.shift, &mut pixmap.as_mut());

        let mut data = pixmap.take();
        demultiply_rgba8_in_place(&mut data);
        *img = image::RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| TimelapseError::validation("caption output buffer size mismatch"))?;
        Ok(true)
    }

    /// Caption the image at `source` and write it to `dest` as JPEG.
    pub fn caption_frame(&self, source: &Path, dest: &Path, text: &str) -> TimelapseResult<()> {
        let mut rgba = image::open(source)
            .map_err(|e| TimelapseError::render(source, format!("cannot open image: {e}")))?
            .to_rgba8();

        self.caption_image(&mut rgba, text)
            .map_err(|e| TimelapseError::render(source, e))?;

        let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
        if let Err(e) = write_jpeg(dest, &rgb, self.style.jpeg_quality) {
            std::fs::remove_file(dest).ok();
            return Err(TimelapseError::render(
                source,
                format!("cannot save '{}': {e:#}", dest.display()),
            ));
        }
        Ok(())
    }

    /// Caption every catalog frame into `out_dir`, preserving catalog order.
    ///
    /// Frames that fail are logged and reported in [`CaptionOutcome::skipped`]; only a failure to
    /// create `out_dir` is an error.
    #[tracing::instrument(skip(self, catalog), fields(frames = catalog.len()))]
    pub fn render_catalog(
        &self,
        catalog: &FrameCatalog,
        out_dir: &Path,
    ) -> TimelapseResult<CaptionOutcome> {
        std::fs::create_dir_all(out_dir).with_context(|| {
            format!("failed to create caption directory '{}'", out_dir.display())
        })?;

        let total = catalog.len();
        let mut outcome = CaptionOutcome::default();
        for (index, frame) in catalog.frames().iter().enumerate() {
            let dest = out_dir.join(frame_file_name(index, total));
            let text = caption_text(frame.timestamp);
            match self.caption_frame(&frame.path, &dest, &text) {
                Ok(()) => {
                    tracing::debug!("captioned '{}' -> '{}'", frame.filename, dest.display());
                    outcome.paths.push(dest);
                }
                Err(error) => {
                    tracing::warn!("skipping frame {index}: {error}");
                    outcome.skipped.push(SkippedFrame {
                        index,
                        source: frame.path.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "captioned {} of {total} frame(s) into '{}'",
            outcome.paths.len(),
            out_dir.display()
        );
        Ok(outcome)
    }
}

fn load_font_db(font_path: Option<&Path>) -> (usvg::fontdb::Database, FontOrigin) {
    if let Some(path) = font_path {
        let mut db = usvg::fontdb::Database::new();
        match db.load_font_file(path) {
            Ok(()) if !db.is_empty() => return (db, FontOrigin::Configured(path.to_path_buf())),
            Ok(()) => tracing::warn!(
                "font '{}' contains no usable face; falling back to system fonts",
                path.display()
            ),
            Err(e) => tracing::warn!(
                "cannot load font '{}': {e}; falling back to system fonts",
                path.display()
            ),
        }
    }

    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    (db, FontOrigin::System)
}

/// Family name to request from `db`; prefers a sans face.
fn pick_family(db: &usvg::fontdb::Database) -> Option<String> {
    let families = || {
        db.faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
    };
    families()
        .find(|name| name.contains("Sans") && !name.contains("Mono"))
        .or_else(|| families().next())
}

fn write_jpeg(dest: &Path, rgb: &image::RgbImage, quality: u8) -> anyhow::Result<()> {
    let file = File::create(dest).context("create file")?;
    let mut writer = BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(rgb)
        .context("encode jpeg")?;
    writer.flush().context("flush jpeg")?;
    Ok(())
}

/// Outline copies first (every offset in the square of `outline_width`, origin excluded), then the
/// fill copy on top. The baseline sits at `font_size` so the text starts inside the canvas.
fn caption_svg(
    text: &str,
    family: &str,
    font_size: f32,
    style: &CaptionStyle,
    width: u32,
    height: u32,
) -> String {
    let text = xml_escape(text);
    let family = xml_escape(&family.replace('\'', ""));
    let reach = style.outline_width as i32;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><g font-family="'{family}'" font-size="{font_size}">"#
    );
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if dx == 0 && dy == 0 {
                continue;
            }
            push_text(&mut svg, &text, dx as f32, font_size + dy as f32, style.outline_rgba);
        }
    }
    push_text(&mut svg, &text, 0.0, font_size, style.fill_rgba);
    svg.push_str("</g></svg>");
    svg
}

fn push_text(svg: &mut String, text: &str, x: f32, y: f32, [r, g, b, a]: [u8; 4]) {
    let opacity = a as f32 / 255.0;
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" fill="rgb({r},{g},{b})" fill-opacity="{opacity}">{text}</text>"#
    ));
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "../tests/unit/caption.rs"]
mod tests;

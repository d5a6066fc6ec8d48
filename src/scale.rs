use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{
    catalog::FrameCatalog,
    foundation::error::{TimelapseError, TimelapseResult},
};

/// Output resolution proposed for the whole video, rendered as `W:H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScaleSuggestion {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ScaleSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for ScaleSuggestion {
    type Err = TimelapseError;

    fn from_str(s: &str) -> TimelapseResult<Self> {
        let bad = || TimelapseError::validation(format!("scale must look like W:H, got '{s}'"));
        let (w, h) = s.split_once(':').ok_or_else(bad)?;
        let width: u32 = w.trim().parse().map_err(|_| bad())?;
        let height: u32 = h.trim().parse().map_err(|_| bad())?;
        if width == 0 || height == 0 {
            return Err(bad());
        }
        Ok(Self { width, height })
    }
}

/// Propose a common scale from the catalog's dimensions.
///
/// Width and height are each the mode of their own axis, so the pair need not belong to any
/// single source image. Ties resolve to the smaller value.
pub fn suggest_scale(catalog: &FrameCatalog) -> Option<ScaleSuggestion> {
    let dims: Vec<(u32, u32)> = catalog.frames().iter().filter_map(|f| f.dimensions()).collect();
    if dims.is_empty() {
        tracing::warn!("no valid image dimensions found; no scale suggestion");
        return None;
    }

    let width = mode(dims.iter().map(|d| d.0))?;
    let height = mode(dims.iter().map(|d| d.1))?;
    let suggestion = ScaleSuggestion { width, height };

    if !dims.contains(&(width, height)) {
        tracing::warn!("suggested scale {suggestion} matches no source image");
    }
    tracing::info!("suggested common scale: {suggestion}");
    Some(suggestion)
}

fn mode(values: impl Iterator<Item = u32>) -> Option<u32> {
    let mut counts = BTreeMap::<u32, usize>::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    // Ascending keys + strict `>` keeps the smallest value among ties.
    let mut best: Option<(u32, usize)> = None;
    for (v, n) in counts {
        if best.is_none_or(|(_, bn)| n > bn) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v)
}

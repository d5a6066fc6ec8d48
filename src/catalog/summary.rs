use std::fmt;

use super::FrameDescriptor;

/// Descriptive statistics over one numeric column.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct AxisStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); `None` with fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl AxisStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.len() > 1).then(|| {
            let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (n - 1.0)).sqrt()
        });
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: values.len(),
            mean,
            std,
            min,
            max,
        })
    }
}

/// Resolution overview of a catalog, for operator visibility only.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct CatalogSummary {
    pub frames: usize,
    pub width: Option<AxisStats>,
    pub height: Option<AxisStats>,
    pub aspect_ratio: Option<AxisStats>,
}

impl CatalogSummary {
    pub fn from_frames(frames: &[FrameDescriptor]) -> Self {
        let widths: Vec<f64> = frames.iter().filter_map(|f| f.width).map(f64::from).collect();
        let heights: Vec<f64> = frames.iter().filter_map(|f| f.height).map(f64::from).collect();
        let ratios: Vec<f64> = frames.iter().filter_map(|f| f.aspect_ratio).collect();
        Self {
            frames: frames.len(),
            width: AxisStats::from_values(&widths),
            height: AxisStats::from_values(&heights),
            aspect_ratio: AxisStats::from_values(&ratios),
        }
    }
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<8} {:>12} {:>12} {:>12}",
            "", "width", "height", "aspect_ratio"
        )?;
        let cols = [self.width, self.height, self.aspect_ratio];
        write_row(f, "count", &cols, |s| Some(s.count as f64))?;
        write_row(f, "mean", &cols, |s| Some(s.mean))?;
        write_row(f, "std", &cols, |s| s.std)?;
        write_row(f, "min", &cols, |s| Some(s.min))?;
        write_row(f, "max", &cols, |s| Some(s.max))?;
        write!(f, "{} frame(s) catalogued", self.frames)
    }
}

fn write_row(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    cols: &[Option<AxisStats>; 3],
    get: fn(&AxisStats) -> Option<f64>,
) -> fmt::Result {
    write!(f, "{label:<8}")?;
    for c in cols {
        match c.as_ref().and_then(get) {
            Some(v) => write!(f, " {v:>12.4}")?,
            None => write!(f, " {:>12}", "-")?,
        }
    }
    writeln!(f)
}

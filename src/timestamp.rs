//! Capture-time resolution for a single image.
//!
//! Resolution order:
//! 1. EXIF `DateTimeOriginal` (format `YYYY:MM:DD HH:MM:SS`)
//! 2. filesystem modification time, in local time
//! 3. nothing
//!
//! Failures at each step are recorded as typed errors and logged; resolution itself never fails.

use std::{fs::File, io::BufReader, path::Path};

use chrono::{DateTime, Local, NaiveDateTime};

use crate::foundation::error::{TimelapseError, TimelapseResult};

/// Layout of EXIF date/time fields.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Where a resolved timestamp came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    Embedded,
    FileModified,
    Unresolved,
}

/// Outcome of [`resolve_capture_time`].
#[derive(Debug)]
pub struct ResolvedTimestamp {
    pub value: Option<NaiveDateTime>,
    pub source: TimestampSource,
    /// Recoverable failures hit on the way, in resolution order.
    pub failures: Vec<TimelapseError>,
}

/// Resolve the best-effort capture time of `path`.
#[tracing::instrument(level = "trace")]
pub fn resolve_capture_time(path: &Path) -> ResolvedTimestamp {
    let mut failures = Vec::new();

    match read_embedded_capture_time(path) {
        Ok(ts) => {
            return ResolvedTimestamp {
                value: Some(ts),
                source: TimestampSource::Embedded,
                failures,
            };
        }
        Err(e) => {
            tracing::info!("{e}; falling back to file modification time");
            failures.push(e);
        }
    }

    match read_modified_time(path) {
        Ok(ts) => ResolvedTimestamp {
            value: Some(ts),
            source: TimestampSource::FileModified,
            failures,
        },
        Err(e) => {
            tracing::warn!("{e}; timestamp left unresolved");
            failures.push(e);
            ResolvedTimestamp {
                value: None,
                source: TimestampSource::Unresolved,
                failures,
            }
        }
    }
}

/// Read and parse EXIF `DateTimeOriginal` from `path`.
pub fn read_embedded_capture_time(path: &Path) -> TimelapseResult<NaiveDateTime> {
    let file = File::open(path).map_err(|e| TimelapseError::metadata_read(path, e))?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| match e {
            exif::Error::NotFound(_) => TimelapseError::metadata_read(path, "no EXIF data"),
            other => {
                tracing::warn!("unreadable EXIF in '{}': {other}", path.display());
                TimelapseError::metadata_read(path, other)
            }
        })?;

    let field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .ok_or_else(|| TimelapseError::metadata_read(path, "no DateTimeOriginal field"))?;

    let raw = match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(|| TimelapseError::metadata_read(path, "empty DateTimeOriginal"))?,
        other => {
            return Err(TimelapseError::metadata_read(
                path,
                format!("DateTimeOriginal has non-ASCII value {other:?}"),
            ));
        }
    };

    parse_exif_datetime(&raw).map_err(|e| {
        tracing::warn!(
            "malformed DateTimeOriginal '{raw}' in '{}': {e}",
            path.display()
        );
        TimelapseError::metadata_read(path, format!("cannot parse '{raw}': {e}"))
    })
}

/// Parse an EXIF date/time string. Trailing NULs and whitespace are ignored.
pub fn parse_exif_datetime(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT)
}

/// Filesystem modification time of `path`, as local wall-clock time.
pub fn read_modified_time(path: &Path) -> TimelapseResult<NaiveDateTime> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| TimelapseError::file_time(path, e))?;
    Ok(DateTime::<Local>::from(modified).naive_local())
}

#[cfg(test)]
#[path = "../tests/unit/timestamp.rs"]
mod tests;

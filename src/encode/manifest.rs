use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::{
    error::{TimelapseError, TimelapseResult},
    token::RunToken,
};

/// Transient `ffmpeg` concat-demuxer input list.
///
/// The file exists exactly as long as this value: it is written by [`EncodeManifest::write`] and
/// removed on drop, whether the encode that used it succeeded or not.
#[derive(Debug)]
pub struct EncodeManifest {
    path: PathBuf,
    entries: usize,
}

impl EncodeManifest {
    /// Write one `file '<abs path>'` line per frame, in order, into `dir`.
    pub fn write(dir: &Path, token: &RunToken, frames: &[PathBuf]) -> TimelapseResult<Self> {
        if frames.is_empty() {
            return Err(TimelapseError::validation("manifest needs at least one frame"));
        }

        let mut body = String::new();
        for frame in frames {
            body.push_str(&manifest_line(frame)?);
            body.push('\n');
        }

        let path = dir.join(manifest_file_name(token));
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write manifest '{}'", path.display()))?;
        tracing::debug!("wrote manifest '{}' ({} entries)", path.display(), frames.len());

        Ok(Self {
            path,
            entries: frames.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

impl Drop for EncodeManifest {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("removed manifest '{}'", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove manifest '{}': {e}", self.path.display()),
        }
    }
}

pub fn manifest_file_name(token: &RunToken) -> String {
    format!(".timelapse_manifest_{token}.txt")
}

/// One concat-demuxer line for `frame`, made absolute so it does not depend on where the
/// manifest lives.
pub fn manifest_line(frame: &Path) -> TimelapseResult<String> {
    let abs = std::path::absolute(frame)
        .with_context(|| format!("failed to resolve '{}'", frame.display()))?;
    let s = abs.to_str().ok_or_else(|| {
        TimelapseError::validation(format!("frame path is not UTF-8: '{}'", abs.display()))
    })?;
    if s.contains(['\n', '\r']) {
        return Err(TimelapseError::validation(format!(
            "frame path contains a line break: {s:?}"
        )));
    }

    let mut line = String::from("file '");
    for c in s.chars() {
        if c == '\'' {
            line.push_str(r"'\''");
        } else {
            line.push(c);
        }
    }
    line.push('\'');
    Ok(line)
}

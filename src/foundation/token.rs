use std::sync::atomic::{AtomicU64, Ordering};

static NEXT: AtomicU64 = AtomicU64::new(0);

/// Per-run identifier embedded in transient file names.
///
/// Built from the process id, wall-clock nanoseconds and an in-process counter, so two runs in
/// the same working directory (or two runs inside one process) never share a manifest or a
/// caption directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunToken(String);

impl RunToken {
    pub fn generate() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}_{nanos}_{seq}", std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

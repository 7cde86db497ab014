use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::json;
use tracing::{debug, warn};

/// Writes the current step of a long run to a JSON file that other tools poll.
/// Without a path every report is dropped.
#[derive(Debug, Clone, Default)]
pub struct ProgressFile {
    path: Option<PathBuf>,
}

impl ProgressFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn report(&self, current: usize, total: usize, phase: &str, status: &str) {
        debug!("[{}/{}] {}: {}", current, total, phase, status);
        if let Some(path) = &self.path {
            if let Err(e) = write_progress(path, current, total, phase, status) {
                warn!("Could not write progress to {}: {}", path.display(), e);
            }
        }
    }
}

pub fn write_progress(
    path: &Path,
    current: usize,
    total: usize,
    phase: &str,
    status: &str,
) -> io::Result<()> {
    let json = json!({
        "current": current,
        "total": total,
        "phase": phase,
        "status": status,
    });
    fs::write(path, json.to_string())
}

//! Resume cursor persistence.
//!
//! The cursor records how far the deterministic work-set scan has advanced.
//! It is written on demand (SIGINT) and loaded on `--resume`, where the
//! scan fast-forwards past the first `index` items.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The persisted resume record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    /// Number of scan items already handed to the workers.
    pub index: u64,
    /// The host the scan stopped at.
    pub resume_from: String,
}

impl ResumeState {
    /// Loads a saved cursor. A corrupted file is logged and ignored.
    pub fn load(path: &Path) -> Option<ResumeState> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("ignoring corrupted resume file {}: {e}", path.display());
                None
            }
        }
    }

    /// Persists the cursor.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;
        std::fs::write(path, data)
    }
}

/// Live scan position, updated as hosts are pushed to the workers.
#[derive(Debug, Default, Clone)]
pub struct ResumeCursor {
    /// Items handed out so far in this process.
    pub current_index: u64,
    /// Host most recently handed out.
    pub current: String,
    /// Fast-forward target loaded from a previous run.
    pub saved_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.cfg");
        let state = ResumeState {
            index: 40,
            resume_from: "h040.test".into(),
        };
        state.save(&path).unwrap();
        assert_eq!(ResumeState::load(&path), Some(state));
    }

    #[test]
    fn corrupted_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.cfg");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(ResumeState::load(&path), None);
    }

    #[test]
    fn missing_file_is_ignored() {
        assert_eq!(ResumeState::load(Path::new("/nonexistent/resume.cfg")), None);
    }
}

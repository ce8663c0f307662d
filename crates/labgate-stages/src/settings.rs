//! Score resolver backed by each lab's `settings.json`
use labgate_core::{GateError, Result, ScoreResolver, TargetScore};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Deserialize)]
struct LabSettings {
    target_score: u64,
}

/// Reads `<labs_root>/<lab>/settings.json`
#[derive(Debug, Clone)]
pub struct SettingsScoreResolver {
    labs_root: PathBuf,
}

impl SettingsScoreResolver {
    pub fn new(labs_root: impl Into<PathBuf>) -> Self {
        Self {
            labs_root: labs_root.into(),
        }
    }

    pub fn settings_path(&self, lab_scope: &str) -> PathBuf {
        self.labs_root.join(lab_scope).join(SETTINGS_FILE)
    }

    fn read(path: &Path) -> Result<TargetScore> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GateError::Applicability(format!("reading {}: {}", path.display(), e)))?;
        let settings: LabSettings = serde_json::from_str(&text)
            .map_err(|e| GateError::Applicability(format!("parsing {}: {}", path.display(), e)))?;
        let raw = u8::try_from(settings.target_score).map_err(|_| {
            GateError::Applicability(format!(
                "{}: unrecognized target score {}",
                path.display(),
                settings.target_score
            ))
        })?;
        TargetScore::new(raw)
            .map_err(|_| GateError::Applicability(format!("{}: unrecognized target score {}", path.display(), raw)))
    }
}

impl ScoreResolver for SettingsScoreResolver {
    fn target_score(&self, lab_scope: &str) -> Result<TargetScore> {
        Self::read(&self.settings_path(lab_scope))
    }
}

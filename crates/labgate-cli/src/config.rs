//! `labgate.yaml` plus environment overrides
use anyhow::{Context, Result};
use labgate_policy::{AdminList, PrNameTemplate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "labgate.yaml";
pub const ENV_CONFIG: &str = "LABGATE_CONFIG";
pub const ENV_ARTIFACT_DIR: &str = "LABGATE_ARTIFACT_DIR";
pub const ENV_ADMINS: &str = "LABGATE_ADMINS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Root of the filesystem artifact store
    pub artifact_dir: PathBuf,
    /// Directory holding `<lab>/settings.json`; per-lab scores are off without it
    pub labs_root: Option<PathBuf>,
    /// One admin login per line
    pub admins_file: Option<PathBuf>,
    /// Scratch space for materialised inputs
    pub work_dir: Option<PathBuf>,
    pub pr_title: PrTitleConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrTitleConfig {
    pub pattern: Option<String>,
    pub example: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(".labgate/artifacts"),
            labs_root: None,
            admins_file: None,
            work_dir: None,
            pr_title: PrTitleConfig::default(),
        }
    }
}

impl GateConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("parsing labgate config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Explicit path, then `LABGATE_CONFIG`, then `./labgate.yaml` if present,
    /// then defaults. Environment overrides apply last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(explicit: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut config = match path {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(ENV_ARTIFACT_DIR).filter(|v| !v.is_empty()) {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(file) = env(ENV_ADMINS).filter(|v| !v.is_empty()) {
            self.admins_file = Some(PathBuf::from(file));
        }
    }

    pub fn admins(&self) -> Result<AdminList> {
        match &self.admins_file {
            Some(path) => Ok(AdminList::load(path)?),
            None => Ok(AdminList::new()),
        }
    }

    pub fn pr_template(&self) -> Result<PrNameTemplate> {
        match (&self.pr_title.pattern, &self.pr_title.example) {
            (Some(pattern), example) => {
                let example = example.clone().unwrap_or_default();
                Ok(PrNameTemplate::new(pattern, example)?)
            }
            (None, _) => Ok(PrNameTemplate::default()),
        }
    }
}

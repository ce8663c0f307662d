//! Stage: one named unit of validation
//!
//! A stage names its prerequisites, when it applies, the action to invoke and
//! how long that action may take. Stages are plain data so a whole pipeline
//! can be loaded from YAML.
use crate::error::{GateError, Result};
use crate::score::ScoreGate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default action budget: 10 minutes
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

/// Default artifact retention, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 5;

/// Longest retention a stage may declare, in days
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage ID (ex: "unittests-scrapper")
    pub id: String,

    /// Stages that must pass first
    #[serde(default)]
    pub needs: Vec<String>,

    /// Lab this stage checks (ex: "lab_5_scrapper")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,

    #[serde(default)]
    pub when: Applicability,

    /// Action ID handed to the checker
    pub action: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Artifact names this stage reads
    #[serde(default)]
    pub consumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<ProducedArtifact>,
}

/// Declarative applicability predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicability {
    /// Run only in admin mode
    #[serde(default)]
    pub admin_only: bool,

    /// Consult the skip predicate (PR title, actor, lab)
    #[serde(default)]
    pub skip_directive: bool,

    /// Select a test subset by target score; score 0 skips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_gate: Option<ScoreGate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedArtifact {
    pub name: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

impl Stage {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            needs: Vec::new(),
            lab: None,
            when: Applicability::default(),
            action: action.into(),
            args: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            consumes: Vec::new(),
            produces: None,
        }
    }

    pub fn needs<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.needs.extend(stages.into_iter().map(Into::into));
        self
    }

    pub fn lab(mut self, lab: impl Into<String>) -> Self {
        self.lab = Some(lab.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.when.admin_only = true;
        self
    }

    pub fn skip_directive(mut self) -> Self {
        self.when.skip_directive = true;
        self
    }

    pub fn score_gate(mut self, gate: ScoreGate) -> Self {
        self.when.score_gate = Some(gate);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn consumes(mut self, artifact: impl Into<String>) -> Self {
        self.consumes.push(artifact.into());
        self
    }

    pub fn produces(mut self, artifact: impl Into<String>, retention_days: u32) -> Self {
        self.produces = Some(ProducedArtifact {
            name: artifact.into(),
            retention_days,
        });
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks that do not depend on other stages
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(GateError::Config("stage id is empty".to_string()));
        }
        // Stage ids name scratch directories
        if self.id == "." || self.id == ".." || self.id.contains(['/', '\\', '\0']) {
            return Err(GateError::Config(format!(
                "stage id '{}' must not contain path separators or be '.' or '..'",
                self.id
            )));
        }
        if self.action.trim().is_empty() {
            return Err(GateError::Config(format!("stage '{}' has no action", self.id)));
        }
        if self.timeout_ms == 0 {
            return Err(GateError::Config(format!("stage '{}' has a zero timeout", self.id)));
        }
        if self.needs.iter().any(|n| n == &self.id) {
            return Err(GateError::Config(format!("stage '{}' depends on itself", self.id)));
        }
        if let Some(gate) = &self.when.score_gate {
            gate.validate().map_err(|e| match e {
                GateError::Config(msg) => GateError::Config(format!("stage '{}': {}", self.id, msg)),
                other => other,
            })?;
        }
        if let Some(produced) = &self.produces {
            if produced.name.trim().is_empty() {
                return Err(GateError::Config(format!(
                    "stage '{}' produces an artifact with an empty name",
                    self.id
                )));
            }
            if produced.retention_days > MAX_RETENTION_DAYS {
                return Err(GateError::Config(format!(
                    "stage '{}' keeps '{}' for {} days; the limit is {}",
                    self.id, produced.name, produced.retention_days, MAX_RETENTION_DAYS
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::TargetScore;

    #[test]
    fn test_builder() {
        let stage = Stage::new("unittests-scrapper", "pytest")
            .needs(["install"])
            .lab("lab_5_scrapper")
            .score_gate(ScoreGate::markers())
            .skip_directive()
            .consumes("raw-dataset")
            .timeout(Duration::from_secs(30));

        assert_eq!(stage.needs, vec!["install".to_string()]);
        assert_eq!(stage.lab.as_deref(), Some("lab_5_scrapper"));
        assert!(stage.when.skip_directive);
        assert!(!stage.when.admin_only);
        assert_eq!(stage.timeout_duration(), Duration::from_secs(30));
        assert!(stage.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(Stage::new("", "x").validate().is_err());
        assert!(Stage::new("a", "").validate().is_err());
        assert!(Stage::new("a", "x").needs(["a"]).validate().is_err());
        assert!(Stage::new("a", "x").timeout(Duration::ZERO).validate().is_err());
        let zero_gate = ScoreGate::new().with(TargetScore::ZERO, "mark0");
        assert!(Stage::new("a", "x").score_gate(zero_gate).validate().is_err());
        assert!(Stage::new("a", "x").produces("", 1).validate().is_err());
    }

    #[test]
    fn test_path_like_ids_rejected() {
        for id in ["../../precious", "a/b", "a\\b", ".", ".."] {
            let err = Stage::new(id, "x").validate().unwrap_err();
            assert!(matches!(err, GateError::Config(_)), "{id} accepted");
        }
        assert!(Stage::new("unittests.v2", "x").validate().is_ok());
    }

    #[test]
    fn test_retention_limit() {
        assert!(Stage::new("a", "x").produces("raw-dataset", MAX_RETENTION_DAYS).validate().is_ok());
        let yaml = "id: a\naction: x\nproduces: {name: raw-dataset, retention_days: 4000000000}\n";
        let stage: Stage = serde_yaml::from_str(yaml).unwrap();
        assert!(stage.validate().unwrap_err().to_string().contains("the limit is"));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let stage = Stage::new("a", "x").timeout(Duration::MAX);
        assert_eq!(stage.timeout_ms, u64::MAX);
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = r#"
id: style
action: lint
"#;
        let stage: Stage = serde_yaml::from_str(yaml).unwrap();
        assert!(stage.needs.is_empty());
        assert_eq!(stage.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(stage.when, Applicability::default());
        assert!(stage.produces.is_none());
    }

    #[test]
    fn test_yaml_full() {
        let yaml = r#"
id: run-scrapper
needs: [unittests-scrapper]
lab: lab_5_scrapper
action: scrape
args: ["--seed", "42"]
timeout_ms: 1200000
when:
  skip_directive: true
  score_gate:
    4: mark4
    10: mark10
produces:
  name: raw-dataset
"#;
        let stage: Stage = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(stage.args, vec!["--seed", "42"]);
        let produced = stage.produces.clone().unwrap();
        assert_eq!(produced.name, "raw-dataset");
        assert_eq!(produced.retention_days, DEFAULT_RETENTION_DAYS);
        let gate = stage.when.score_gate.clone().unwrap();
        assert_eq!(gate.select(TargetScore::TEN).unwrap(), Some("mark10"));
        assert!(stage.validate().is_ok());
    }
}

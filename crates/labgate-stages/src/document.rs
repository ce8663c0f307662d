//! Pipeline file: stage graph plus the command table its actions resolve to
use crate::process::{CommandSpec, PR_NAME_ACTION};
use labgate_core::{GateError, Pipeline, Result, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: BTreeMap<String, CommandSpec>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl PipelineDocument {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: PipelineDocument = serde_yaml::from_str(yaml)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Graph checks, plus every action resolving to a command or a built-in
    pub fn validate(&self) -> Result<()> {
        self.pipeline().validate()?;
        for stage in &self.stages {
            if !self.actions.contains_key(&stage.action) && stage.action != PR_NAME_ACTION {
                return Err(GateError::Config(format!(
                    "stage '{}' uses undefined action '{}'",
                    stage.id, stage.action
                )));
            }
        }
        for (id, spec) in &self.actions {
            if spec.program.trim().is_empty() {
                return Err(GateError::Config(format!("action '{}' has no program", id)));
            }
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline {
            name: self.name.clone(),
            description: self.description.clone(),
            stages: self.stages.clone(),
        }
    }

    pub fn into_parts(self) -> (Pipeline, BTreeMap<String, CommandSpec>) {
        let pipeline = Pipeline {
            name: self.name,
            description: self.description,
            stages: self.stages,
        };
        (pipeline, self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgate_core::TargetScore;

    const DOC: &str = r#"
name: lab-ci
actions:
  pytest:
    program: python
    args: [-m, pytest, -l]
  scrape:
    program: python
    args: [lab_5_scrapper/scrapper.py]
    output_dir: tmp/articles
stages:
  - id: check-pr-name
    action: pr-name
  - id: unittests-scrapper
    needs: [check-pr-name]
    action: pytest
    lab: lab_5_scrapper
    when:
      skip_directive: true
      score_gate: {4: mark4, 6: mark6, 8: mark8, 10: mark10}
  - id: run-scrapper
    needs: [unittests-scrapper]
    action: scrape
    produces: {name: raw-dataset, retention_days: 5}
"#;

    #[test]
    fn test_parses_actions_and_stages() {
        let doc = PipelineDocument::from_yaml(DOC).unwrap();
        assert_eq!(doc.actions.len(), 2);
        assert_eq!(doc.actions["scrape"].output_dir.as_deref(), Some(Path::new("tmp/articles")));

        let (pipeline, actions) = doc.into_parts();
        assert_eq!(
            pipeline.execution_order().unwrap(),
            vec!["check-pr-name", "unittests-scrapper", "run-scrapper"]
        );
        assert!(actions.contains_key("pytest"));

        let gate = pipeline.stages[1].when.score_gate.as_ref().unwrap();
        assert_eq!(gate.select(TargetScore::SIX).unwrap(), Some("mark6"));
    }

    #[test]
    fn test_undefined_action_rejected() {
        let yaml = "name: x\nstages:\n  - id: lint\n    action: pylint\n";
        let err = PipelineDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("undefined action 'pylint'"));
    }

    #[test]
    fn test_bundled_lab_ci_pipeline() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../pipelines/lab-ci.yaml");
        let doc = PipelineDocument::load(path).unwrap();
        let order = doc.pipeline().execution_order().unwrap().join(" ");
        assert_eq!(
            order,
            "check-pr-name code-style unittests-scrapper run-scrapper \
             unittests-pipeline run-pipeline regenerate-references"
        );
    }
}

//! Pipeline definition loaded from YAML
use crate::error::Result;
use crate::graph;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let pipeline: Pipeline = serde_yaml::from_str(yaml)?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    /// Per-stage checks plus the graph checks
    pub fn validate(&self) -> Result<()> {
        for stage in &self.stages {
            stage.validate()?;
        }
        graph::topological_order(&self.stages)?;
        Ok(())
    }

    pub fn execution_order(&self) -> Result<Vec<&str>> {
        Ok(graph::topological_order(&self.stages)?
            .into_iter()
            .map(|i| self.stages[i].id.as_str())
            .collect())
    }
}

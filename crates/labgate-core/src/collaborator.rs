//! Collaborator contracts: the external tools a run delegates to
//!
//! The runner never lints, tests or scrapes anything itself. It calls a
//! [`Checker`] for stage actions, a [`SkipPredicate`] for skip directives and
//! a [`ScoreResolver`] for per-lab target scores.
use crate::artifact::{Artifact, FileSet};
use crate::error::Result;
use crate::score::TargetScore;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// One action invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub run_id: String,
    pub stage_id: String,
    pub action_id: String,
    pub target_score: TargetScore,
    pub actor: String,
    pub pr_title: Option<String>,
    pub extra_args: Vec<String>,
    /// Test subset selected by the stage's score gate
    pub test_subset: Option<String>,
    /// Consumed artifacts; `None` when the upstream never produced one
    pub inputs: BTreeMap<String, Option<Artifact>>,
}

/// What an action reported back
#[derive(Debug, Clone, Default)]
pub struct CheckOutput {
    pub exit_code: i32,
    pub stdout: String,
    /// Files to store as the stage's produced artifact
    pub produced: Option<FileSet>,
}

impl CheckOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            produced: None,
        }
    }

    pub fn with_produced(mut self, files: FileSet) -> Self {
        self.produced = Some(files);
        self
    }
}

/// Runs stage actions
#[async_trait]
pub trait Checker: Send + Sync {
    /// An `Err` means the action could not be carried out at all
    /// (unknown action, spawn failure); a failing check is an `Ok` with a
    /// non-zero exit code.
    async fn invoke(&self, invocation: &Invocation) -> Result<CheckOutput>;
}

/// Decides whether a PR title or actor requests skipping a lab
pub trait SkipPredicate: Send + Sync {
    fn is_skipped(&self, pr_title: Option<&str>, actor: &str, lab_scope: Option<&str>) -> Result<bool>;
}

/// Looks up the target score a lab declares
pub trait ScoreResolver: Send + Sync {
    fn target_score(&self, lab_scope: &str) -> Result<TargetScore>;
}

/// Skip predicate that never skips
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkip;

impl SkipPredicate for NeverSkip {
    fn is_skipped(&self, _pr_title: Option<&str>, _actor: &str, _lab_scope: Option<&str>) -> Result<bool> {
        Ok(false)
    }
}

/// Resolver returning fixed scores per lab
#[derive(Debug, Clone, Default)]
pub struct FixedScores {
    scores: BTreeMap<String, TargetScore>,
}

impl FixedScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, lab_scope: impl Into<String>, score: TargetScore) -> Self {
        self.scores.insert(lab_scope.into(), score);
        self
    }
}

impl ScoreResolver for FixedScores {
    fn target_score(&self, lab_scope: &str) -> Result<TargetScore> {
        self.scores.get(lab_scope).copied().ok_or_else(|| {
            crate::error::GateError::Applicability(format!("no target score known for '{}'", lab_scope))
        })
    }
}

//! Skip rules for whole-lab skips
//!
//! A lab's checks are skipped when the PR title carries the skip directive,
//! when an admin opened the PR, or when the lab declares target score 0.

use crate::admins::AdminList;
use labgate_core::{Result, ScoreResolver, SkipPredicate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Literal a PR title carries to skip lab checks
pub const SKIP_LAB_DIRECTIVE: &str = "[skip-lab]";

/// Why a lab was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    Directive,
    AdminAuthor,
    ZeroScore,
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipCause::Directive => write!(f, "skip directive in PR title"),
            SkipCause::AdminAuthor => write!(f, "PR opened by an admin"),
            SkipCause::ZeroScore => write!(f, "lab declares no mark"),
        }
    }
}

pub struct SkipRules {
    directive: String,
    admins: AdminList,
    scores: Option<Arc<dyn ScoreResolver>>,
}

impl SkipRules {
    pub fn new(admins: AdminList) -> Self {
        Self {
            directive: SKIP_LAB_DIRECTIVE.to_string(),
            admins,
            scores: None,
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    /// Also skip labs whose resolved target score is 0
    pub fn with_score_resolver(mut self, scores: Arc<dyn ScoreResolver>) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn admins(&self) -> &AdminList {
        &self.admins
    }

    /// First matching skip cause, checked in order: directive, admin, score.
    pub fn cause(&self, pr_title: Option<&str>, actor: &str, lab_scope: Option<&str>) -> Result<Option<SkipCause>> {
        if pr_title.is_some_and(|t| t.contains(self.directive.as_str())) {
            return Ok(Some(SkipCause::Directive));
        }
        if self.admins.contains(actor) {
            return Ok(Some(SkipCause::AdminAuthor));
        }
        if let (Some(lab), Some(scores)) = (lab_scope, &self.scores) {
            if scores.target_score(lab)?.is_zero() {
                return Ok(Some(SkipCause::ZeroScore));
            }
        }
        Ok(None)
    }
}

impl SkipPredicate for SkipRules {
    fn is_skipped(&self, pr_title: Option<&str>, actor: &str, lab_scope: Option<&str>) -> Result<bool> {
        let cause = self.cause(pr_title, actor, lab_scope)?;
        if let Some(cause) = cause {
            info!(actor, lab = ?lab_scope, %cause, "skipping lab checks");
        }
        Ok(cause.is_some())
    }
}

//! Run Context: state threaded through one pipeline execution
use crate::artifact::Artifact;
use crate::score::TargetScore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-scoped cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages that have not started yet will be skipped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Score used by stages that have no lab scope to resolve one from
    pub target_score: TargetScore,
    pub actor: String,
    pub pr_title: Option<String>,
    pub admin: bool,
    /// Artifacts seen so far in this run, by name
    pub artifacts: BTreeMap<String, Artifact>,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(actor: impl Into<String>, target_score: TargetScore) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            target_score,
            actor: actor.into(),
            pr_title: None,
            admin: false,
            artifacts: BTreeMap::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_pr_title(mut self, title: impl Into<String>) -> Self {
        self.pr_title = Some(title.into());
        self
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let ctx = RunContext::new("student", TargetScore::EIGHT).with_cancel(token.clone());
        assert!(!ctx.cancel.is_cancelled());
        token.cancel();
        assert!(ctx.cancel.is_cancelled());
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new("a", TargetScore::FOUR);
        let b = RunContext::new("a", TargetScore::FOUR);
        assert_ne!(a.run_id, b.run_id);
        assert!(!a.admin);
        assert!(a.pr_title.is_none());
    }
}

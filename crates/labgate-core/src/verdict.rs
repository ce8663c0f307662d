//! Verdict types for stage evaluation
//!
//! Every stage ends a run with exactly one verdict: skipped, passed or
//! failed, plus diagnostic text. Verdicts are recorded once in a
//! [`VerdictLedger`] and never rewritten.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Exit code a test runner uses for "no tests collected".
///
/// Treated as a pass: a submission with no applicable checks at its score
/// tier is not penalised.
pub const NO_TESTS_COLLECTED: i32 = 5;

/// The result of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// Stage was not executed
    Skipped {
        reason: SkipReason,
        diagnostic: String,
    },

    /// Stage action succeeded
    Passed {
        exit_code: i32,
        diagnostic: String,
    },

    /// Stage action, its timeout, or its applicability check failed
    Failed {
        kind: FailureKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        diagnostic: String,
    },
}

/// Why a stage was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SkipReason {
    /// A prerequisite did not pass
    Upstream { stage: String },
    /// Stage only runs in admin mode
    AdminOnly,
    /// PR title or actor requested a skip
    Directive,
    /// Target score is 0
    ZeroScore,
    /// The run was cancelled before this stage started
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Action,
    Timeout,
    Applicability,
}

/// Coarse status, for summaries and comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    Passed,
    Failed,
}

impl Verdict {
    pub fn skipped(reason: SkipReason, diagnostic: impl Into<String>) -> Self {
        Verdict::Skipped {
            reason,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn passed(exit_code: i32, diagnostic: impl Into<String>) -> Self {
        Verdict::Passed {
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failed(kind: FailureKind, exit_code: Option<i32>, diagnostic: impl Into<String>) -> Self {
        Verdict::Failed {
            kind,
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }

    /// Classify a collaborator exit status.
    ///
    /// 0 passes, [`NO_TESTS_COLLECTED`] passes, anything else fails.
    pub fn from_exit(exit_code: i32, output: impl Into<String>) -> Self {
        let output = output.into();
        match exit_code {
            0 => Verdict::passed(0, output),
            NO_TESTS_COLLECTED => {
                let note = "no tests collected for this target score; counted as passed";
                let diagnostic = if output.is_empty() {
                    note.to_string()
                } else {
                    format!("{}\n{}", output, note)
                };
                Verdict::passed(NO_TESTS_COLLECTED, diagnostic)
            }
            code => Verdict::failed(FailureKind::Action, Some(code), output),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Verdict::Skipped { .. } => Outcome::Skipped,
            Verdict::Passed { .. } => Outcome::Passed,
            Verdict::Failed { .. } => Outcome::Failed,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Verdict::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Verdict::Failed { .. })
    }

    pub fn diagnostic(&self) -> &str {
        match self {
            Verdict::Skipped { diagnostic, .. }
            | Verdict::Passed { diagnostic, .. }
            | Verdict::Failed { diagnostic, .. } => diagnostic,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Skipped { reason, .. } => write!(f, "SKIPPED ({})", reason),
            Verdict::Passed { exit_code, .. } => {
                write!(f, "PASSED")?;
                if *exit_code != 0 {
                    write!(f, " (exit {})", exit_code)?;
                }
                Ok(())
            }
            Verdict::Failed { kind, exit_code, .. } => {
                write!(f, "FAILED ({})", kind)?;
                if let Some(code) = exit_code {
                    write!(f, " exit {}", code)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::Upstream { stage } => write!(f, "upstream '{}' did not pass", stage),
            SkipReason::AdminOnly => write!(f, "admin only"),
            SkipReason::Directive => write!(f, "skip directive"),
            SkipReason::ZeroScore => write!(f, "target score 0"),
            SkipReason::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureKind::Action => write!(f, "action"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Applicability => write!(f, "applicability"),
        }
    }
}

/// Write-once record of verdicts for a single run
#[derive(Debug, Clone, Default)]
pub struct VerdictLedger {
    order: Vec<String>,
    verdicts: HashMap<String, Verdict>,
}

impl VerdictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage's verdict. A second write for the same stage is rejected.
    pub fn record(&mut self, stage_id: &str, verdict: Verdict) -> Result<()> {
        if self.verdicts.contains_key(stage_id) {
            return Err(GateError::VerdictAlreadyRecorded(stage_id.to_string()));
        }
        self.order.push(stage_id.to_string());
        self.verdicts.insert(stage_id.to_string(), verdict);
        Ok(())
    }

    pub fn get(&self, stage_id: &str) -> Option<&Verdict> {
        self.verdicts.get(stage_id)
    }

    /// Verdicts in the order they were recorded
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Verdict)> {
        self.order
            .iter()
            .filter_map(|id| self.verdicts.get(id).map(|v| (id.as_str(), v)))
    }

    /// True iff every non-skipped verdict passed
    pub fn is_success(&self) -> bool {
        self.verdicts.values().all(|v| !v.is_failed())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

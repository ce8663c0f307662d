//! Run report: per-stage records and the overall verdict
use crate::score::TargetScore;
use crate::verdict::{Outcome, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage_id: String,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Score the stage was evaluated at, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_score: Option<TargetScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_subset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub actor: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records in execution order
    pub stages: Vec<StageRecord>,
    pub cancelled: bool,
    /// True iff every non-skipped stage passed
    pub success: bool,
}

/// Stage counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunReport {
    pub fn record(&self, stage_id: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage_id == stage_id)
    }

    pub fn verdict(&self, stage_id: &str) -> Option<&Verdict> {
        self.record(stage_id).map(|r| &r.verdict)
    }

    /// `(stage, outcome)` pairs in execution order
    pub fn outcomes(&self) -> Vec<(String, Outcome)> {
        self.stages
            .iter()
            .map(|r| (r.stage_id.clone(), r.verdict.outcome()))
            .collect()
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.stages
            .iter()
            .fold(OutcomeCounts::default(), |mut acc, r| {
                match r.verdict.outcome() {
                    Outcome::Passed => acc.passed += 1,
                    Outcome::Failed => acc.failed += 1,
                    Outcome::Skipped => acc.skipped += 1,
                }
                acc
            })
    }

    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self
            .stages
            .iter()
            .filter(|r| r.verdict.is_failed())
            .map(|r| r.stage_id.as_str())
            .collect();
        let counts = self.counts();

        if !failed.is_empty() {
            format!("Failed: {}", failed.join(", "))
        } else if counts.passed == 0 {
            "All stages skipped".to_string()
        } else if counts.skipped > 0 {
            format!("Passed ({} skipped)", counts.skipped)
        } else {
            "All stages passed".to_string()
        }
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{FailureKind, SkipReason};

    fn record(id: &str, verdict: Verdict) -> StageRecord {
        StageRecord {
            stage_id: id.to_string(),
            verdict,
            started_at: Utc::now(),
            duration_ms: 0,
            target_score: None,
            test_subset: None,
        }
    }

    fn report(stages: Vec<StageRecord>) -> RunReport {
        let success = stages.iter().all(|r| !r.verdict.is_failed());
        RunReport {
            run_id: "run-1".to_string(),
            actor: "student".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stages,
            cancelled: false,
            success,
        }
    }

    #[test]
    fn test_summary_lists_failures() {
        let r = report(vec![
            record("a", Verdict::failed(FailureKind::Action, Some(1), "")),
            record("b", Verdict::skipped(SkipReason::Upstream { stage: "a".into() }, "")),
        ]);
        assert_eq!(r.summary(), "Failed: a");
        assert_eq!(
            r.counts(),
            OutcomeCounts {
                passed: 0,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_summary_variants() {
        let all_skipped = report(vec![record("a", Verdict::skipped(SkipReason::ZeroScore, ""))]);
        assert_eq!(all_skipped.summary(), "All stages skipped");
        assert!(all_skipped.success);

        let mixed = report(vec![
            record("a", Verdict::passed(0, "")),
            record("b", Verdict::skipped(SkipReason::AdminOnly, "")),
        ]);
        assert_eq!(mixed.summary(), "Passed (1 skipped)");

        let clean = report(vec![record("a", Verdict::passed(0, ""))]);
        assert_eq!(clean.summary(), "All stages passed");
    }

    #[test]
    fn test_report_json() {
        let r = report(vec![record("a", Verdict::passed(0, "fine"))]);
        let json = r.to_json_pretty().unwrap();
        assert!(json.contains("\"stage_id\": \"a\""));
        assert!(json.contains("\"success\": true"));
        assert!(!json.contains("test_subset"));
    }
}

//! Target scores and score-gated test selection
//!
//! A submission declares the grading tier it aims for. Each stage that is
//! score-gated maps a tier to the named test subset it should run.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Grading tier declared by a submission: one of 0, 4, 6, 8 or 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TargetScore(u8);

impl TargetScore {
    pub const ZERO: TargetScore = TargetScore(0);
    pub const FOUR: TargetScore = TargetScore(4);
    pub const SIX: TargetScore = TargetScore(6);
    pub const EIGHT: TargetScore = TargetScore(8);
    pub const TEN: TargetScore = TargetScore(10);

    /// Every recognised tier, ascending
    pub const ALL: [TargetScore; 5] = [
        Self::ZERO,
        Self::FOUR,
        Self::SIX,
        Self::EIGHT,
        Self::TEN,
    ];

    pub fn new(raw: u8) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.0 == raw)
            .ok_or_else(|| {
                GateError::Config(format!(
                    "unrecognized target score {} (expected one of 0, 4, 6, 8, 10)",
                    raw
                ))
            })
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for TargetScore {
    type Error = GateError;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<TargetScore> for u8 {
    fn from(score: TargetScore) -> u8 {
        score.0
    }
}

impl fmt::Display for TargetScore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TargetScore {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        let raw: u8 = s
            .trim()
            .parse()
            .map_err(|_| GateError::Config(format!("target score '{}' is not a number", s)))?;
        Self::new(raw)
    }
}

/// Maps target scores to the test subset a stage runs at that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreGate {
    subsets: BTreeMap<TargetScore, String>,
}

impl ScoreGate {
    /// Empty gate; every non-zero score is then a configuration error.
    pub fn new() -> Self {
        Self {
            subsets: BTreeMap::new(),
        }
    }

    /// Gate selecting pytest markers `mark4` .. `mark10`.
    pub fn markers() -> Self {
        Self::ALL_NONZERO
            .iter()
            .fold(Self::new(), |gate, s| gate.with(*s, format!("mark{}", s)))
    }

    const ALL_NONZERO: [TargetScore; 4] = [
        TargetScore::FOUR,
        TargetScore::SIX,
        TargetScore::EIGHT,
        TargetScore::TEN,
    ];

    pub fn with(mut self, score: TargetScore, subset: impl Into<String>) -> Self {
        self.subsets.insert(score, subset.into());
        self
    }

    /// Test subset for a score.
    ///
    /// `Ok(None)` means the stage does not apply (score 0). A non-zero score
    /// without a mapped subset is a configuration error.
    pub fn select(&self, score: TargetScore) -> Result<Option<&str>> {
        if score.is_zero() {
            return Ok(None);
        }
        self.subsets
            .get(&score)
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| GateError::Config(format!("no test subset mapped for target score {}", score)))
    }

    /// Checks the gate is well formed: score 0 never maps to a subset.
    pub fn validate(&self) -> Result<()> {
        if self.subsets.contains_key(&TargetScore::ZERO) {
            return Err(GateError::Config(
                "score gate cannot map target score 0; it always skips".to_string(),
            ));
        }
        if let Some((score, _)) = self.subsets.iter().find(|(_, s)| s.trim().is_empty()) {
            return Err(GateError::Config(format!(
                "score gate maps target score {} to an empty subset",
                score
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.subsets.is_empty()
    }
}

impl Default for ScoreGate {
    fn default() -> Self {
        Self::markers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognised_scores() {
        for raw in [0u8, 4, 6, 8, 10] {
            assert_eq!(TargetScore::new(raw).unwrap().value(), raw);
        }
    }

    #[test]
    fn test_unrecognised_score_is_config_error() {
        let err = TargetScore::new(7).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
        assert!("11".parse::<TargetScore>().is_err());
        assert!("eight".parse::<TargetScore>().is_err());
    }

    #[test]
    fn test_score_deserialization_rejects_unknown() {
        let ok: TargetScore = serde_yaml::from_str("8").unwrap();
        assert_eq!(ok, TargetScore::EIGHT);
        assert!(serde_yaml::from_str::<TargetScore>("3").is_err());
    }

    #[test]
    fn test_markers_gate() {
        let gate = ScoreGate::markers();
        assert_eq!(gate.select(TargetScore::ZERO).unwrap(), None);
        assert_eq!(gate.select(TargetScore::SIX).unwrap(), Some("mark6"));
        assert_eq!(gate.select(TargetScore::TEN).unwrap(), Some("mark10"));
    }

    #[test]
    fn test_unmapped_score_is_error_not_skip() {
        let gate = ScoreGate::new().with(TargetScore::TEN, "mark10");
        assert!(matches!(
            gate.select(TargetScore::FOUR),
            Err(GateError::Config(_))
        ));
    }

    #[test]
    fn test_gate_validation() {
        assert!(ScoreGate::markers().validate().is_ok());
        let bad = ScoreGate::new().with(TargetScore::ZERO, "mark0");
        assert!(bad.validate().is_err());
        let empty_subset = ScoreGate::new().with(TargetScore::FOUR, "  ");
        assert!(empty_subset.validate().is_err());
    }

    #[test]
    fn test_gate_from_yaml() {
        let gate: ScoreGate = serde_yaml::from_str("4: basic\n10: full\n").unwrap();
        assert_eq!(gate.select(TargetScore::FOUR).unwrap(), Some("basic"));
        assert_eq!(gate.select(TargetScore::TEN).unwrap(), Some("full"));
    }
}

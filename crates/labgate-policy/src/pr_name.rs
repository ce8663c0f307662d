//! PR title template check
use crate::admins::AdminList;
use labgate_core::{GateError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal a PR title carries to skip the title check
pub const SKIP_NAME_DIRECTIVE: &str = "[skip-name]";

/// Course default: `Laboratory work #5, Ivanov Ivan - 22FPL1`
pub const DEFAULT_PATTERN: &str =
    r"^Laboratory work #\d+, [A-Z][a-z]+ [A-Z][a-z]+ - \d{2}[A-Z]{2,4}\d(-\d)?$";
pub const DEFAULT_EXAMPLE: &str = "Laboratory work #5, Ivanov Ivan - 22FPL1";

static DEFAULT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_PATTERN).unwrap());

/// Result of checking a PR title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PrNameCheck {
    Skipped { reason: String },
    Matches,
    Mismatch { title: String, example: String },
}

impl PrNameCheck {
    pub fn exit_code(&self) -> i32 {
        match self {
            PrNameCheck::Skipped { .. } | PrNameCheck::Matches => 0,
            PrNameCheck::Mismatch { .. } => 1,
        }
    }

    pub fn message(&self) -> String {
        match self {
            PrNameCheck::Skipped { reason } => format!("Skipping PR name checks: {}.", reason),
            PrNameCheck::Matches => "Your Pull Request name conforms to the provided template.".to_string(),
            PrNameCheck::Mismatch { title, example } => format!(
                "Your Pull Request title '{}' does not conform to the template.\nExample: {}",
                title, example
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrNameTemplate {
    pattern: Regex,
    example: String,
}

impl PrNameTemplate {
    pub fn new(pattern: &str, example: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| GateError::Config(format!("invalid PR title pattern: {}", e)))?;
        Ok(Self {
            pattern,
            example: example.into(),
        })
    }

    pub fn example(&self) -> &str {
        &self.example
    }

    /// Underscores in raw titles (branch-style names) count as spaces.
    pub fn normalize(raw: &str) -> String {
        raw.replace('_', " ")
    }

    pub fn matches(&self, title: &str) -> bool {
        self.pattern.is_match(&Self::normalize(title))
    }

    pub fn check(&self, title: &str, actor: &str, admins: &AdminList) -> PrNameCheck {
        if title.contains(SKIP_NAME_DIRECTIVE) {
            return PrNameCheck::Skipped {
                reason: "skip directive in title".to_string(),
            };
        }
        if admins.contains(actor) {
            return PrNameCheck::Skipped {
                reason: "PR opened by an admin".to_string(),
            };
        }
        if self.matches(title) {
            PrNameCheck::Matches
        } else {
            PrNameCheck::Mismatch {
                title: title.to_string(),
                example: self.example.clone(),
            }
        }
    }
}

impl Default for PrNameTemplate {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_REGEX.clone(),
            example: DEFAULT_EXAMPLE.to_string(),
        }
    }
}

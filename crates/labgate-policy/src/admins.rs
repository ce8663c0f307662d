//! Admin list: logins that bypass student-facing checks
use labgate_core::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminList {
    logins: BTreeSet<String>,
}

impl AdminList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_logins<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            logins: logins
                .into_iter()
                .map(|l| l.as_ref().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// One login per line; blank lines and surrounding whitespace ignored
    pub fn parse(text: &str) -> Self {
        Self::from_logins(text.lines())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GateError::Applicability(format!("reading admins file {}: {}", path.display(), e)))?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, login: &str) -> bool {
        self.logins.contains(login.trim())
    }

    pub fn len(&self) -> usize {
        self.logins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }
}

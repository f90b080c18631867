//! Human-readable usage reports.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live membership of one state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUsage {
    /// State name as rendered by `Display`.
    pub state: String,
    /// Live member count.
    pub count: usize,
    /// Fragments holding those members.
    pub fragments: usize,
}

/// Snapshot of per-state usage. Only nonempty states are listed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub states: Vec<StateUsage>,
    pub total: usize,
}

impl UsageReport {
    /// Usage for a state by its rendered name.
    pub fn get(&self, state: &str) -> Option<&StateUsage> {
        self.states.iter().find(|u| u.state == state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for usage in &self.states {
            writeln!(
                f,
                "\t{} -> {} (in {} fragments)",
                usage.state, usage.count, usage.fragments
            )?;
        }
        writeln!(f, "\tTotal -> {}", self.total)
    }
}

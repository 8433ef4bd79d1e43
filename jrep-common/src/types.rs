//! Shared request/configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Aggregation policy applied to a job's log lines
///
/// Chosen once at job start; only the aggregator's fold step branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One record per build, every issue referenced under it
    AllIssues,
    /// One record per build, first issue referenced under it
    #[default]
    FirstIssue,
    /// One row per issue reference occurrence
    PerReference,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::AllIssues => "all_issues",
            AggregationMode::FirstIssue => "first_issue",
            AggregationMode::PerReference => "per_reference",
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all_issues" => Ok(AggregationMode::AllIssues),
            "first_issue" => Ok(AggregationMode::FirstIssue),
            "per_reference" => Ok(AggregationMode::PerReference),
            other => Err(Error::InvalidInput(format!(
                "Unknown aggregation mode: {} (expected all_issues, first_issue or per_reference)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parses_snake_case() {
        assert_eq!("all_issues".parse::<AggregationMode>().unwrap(), AggregationMode::AllIssues);
        assert_eq!(" first_issue ".parse::<AggregationMode>().unwrap(), AggregationMode::FirstIssue);
        assert_eq!(
            "per_reference".parse::<AggregationMode>().unwrap(),
            AggregationMode::PerReference
        );
        assert!("AllIssues".parse::<AggregationMode>().is_err());
    }

    #[test]
    fn test_mode_serde_matches_display() {
        for mode in [
            AggregationMode::AllIssues,
            AggregationMode::FirstIssue,
            AggregationMode::PerReference,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }

    #[test]
    fn test_default_mode_is_first_issue() {
        assert_eq!(AggregationMode::default(), AggregationMode::FirstIssue);
    }
}

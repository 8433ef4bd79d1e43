//! Reference extraction from single log lines
//!
//! Pure functions: a line either announces a build (`#<digits>`, optional
//! `(<time>)`), mentions zero or more issue keys (`<PREFIX>-<digits>`), or
//! neither.

use once_cell::sync::Lazy;
use regex::Regex;

use jrep_common::config::DEFAULT_PROJECT_PREFIX;

static BUILD_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\d+)").expect("build number pattern is valid"));

static BUILD_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("build time pattern is valid"));

/// Build header found on a log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMarker {
    pub build_number: String,
    /// Parenthesized text on the same line; empty if none
    pub build_time: String,
}

/// First `#<digits>` token on the line, with the first parenthesized text
pub fn extract_build_marker(line: &str) -> Option<BuildMarker> {
    let build_number = BUILD_NUMBER.captures(line)?.get(1)?.as_str().to_string();
    let build_time = BUILD_TIME
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some(BuildMarker {
        build_number,
        build_time,
    })
}

/// Matches issue keys for one project prefix
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    prefix: String,
    issue_key: Regex,
}

impl ReferenceExtractor {
    /// Extractor for keys of the form `<prefix>-<digits>`
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let prefix = prefix.trim();
        let issue_key = Regex::new(&format!(r"{}-\d+", regex::escape(prefix)))?;
        Ok(Self {
            prefix: prefix.to_string(),
            issue_key,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// All keys on the line, left to right, duplicates kept
    pub fn extract_issue_keys(&self, line: &str) -> Vec<String> {
        self.issue_key
            .find_iter(line)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_PREFIX).expect("default issue key pattern is valid")
    }
}

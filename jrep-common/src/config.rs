//! Configuration loading and config file resolution

use crate::types::AggregationMode;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:5001";

/// Default lifetime of an unclaimed report or job (seconds)
pub const DEFAULT_RETENTION_SECS: u64 = 3600;

/// Default issue key prefix
pub const DEFAULT_PROJECT_PREFIX: &str = "ITSM";

/// Default Jira custom field holding the approval history
pub const DEFAULT_APPROVALS_FIELD: &str = "customfield_10027";

/// Default timeout for a single tracker lookup (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "JREP_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub tracker: TrackerConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:5001"
    pub bind: String,
    /// How long finished reports and unclaimed jobs are kept
    pub report_retention_secs: u64,
    /// Aggregation mode used when a request does not name one
    pub default_mode: AggregationMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            report_retention_secs: DEFAULT_RETENTION_SECS,
            default_mode: AggregationMode::default(),
        }
    }
}

/// Issue tracker connection settings
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the Jira deployment (no trailing slash required)
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub api_token: Option<String>,
    /// Project prefix of issue keys ("ITSM" matches "ITSM-123")
    pub project_prefix: String,
    /// Custom field carrying approval entries
    pub approvals_field: String,
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user: None,
            api_token: None,
            project_prefix: DEFAULT_PROJECT_PREFIX.to_string(),
            approvals_field: DEFAULT_APPROVALS_FIELD.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// Keeps the API token out of logs.
impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("project_prefix", &self.project_prefix)
            .field("approvals_field", &self.approvals_field)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TrackerConfig {
    /// Base URL with any trailing slash removed
    pub fn normalized_base_url(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
    }
}

impl TomlConfig {
    /// Apply environment overrides on top of file values
    ///
    /// Variable names follow the existing deployment convention
    /// (`JIRA_URL`, `JIRA_USER`, `JIRA_API_TOKEN`) plus `JREP_BIND`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env("JIRA_URL") {
            self.tracker.base_url = Some(url);
        }
        if let Some(user) = non_empty_env("JIRA_USER") {
            self.tracker.user = Some(user);
        }
        if let Some(token) = non_empty_env("JIRA_API_TOKEN") {
            self.tracker.api_token = Some(token);
        }
        if let Some(bind) = non_empty_env("JREP_BIND") {
            self.server.bind = bind;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Config file resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. `JREP_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/jrep/jrep-export.toml`) if it exists
///
/// Returns `None` when no file applies; compiled defaults are used then.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|d| d.join("jrep").join("jrep-export.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration: file (if any) → environment overrides
///
/// An explicitly named file that cannot be read is an error; an absent
/// default file is not.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        None => {
            debug!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

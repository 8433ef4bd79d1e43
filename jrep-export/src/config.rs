//! Configuration resolution for jrep-export
//!
//! Priority: command line → environment → TOML file → compiled default.
//! File and environment layers are handled by `jrep_common::config`; this
//! module applies command-line overrides and checks tracker settings.

use jrep_common::config::{load_config, TomlConfig, TrackerConfig};
use jrep_common::{AggregationMode, Result};
use std::path::Path;
use tracing::{info, warn};

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub default_mode: Option<AggregationMode>,
    pub project_prefix: Option<String>,
}

/// Load the full configuration for the service
pub fn resolve_config(config_path: Option<&Path>, cli: &CliOverrides) -> Result<TomlConfig> {
    let mut config = load_config(config_path)?;
    apply_cli_overrides(&mut config, cli);

    for warning in tracker_warnings(&config.tracker) {
        warn!("{}", warning);
    }

    info!(
        bind = %config.server.bind,
        default_mode = %config.server.default_mode,
        project_prefix = %config.tracker.project_prefix,
        tracker = config.tracker.normalized_base_url().as_deref().unwrap_or("<none>"),
        "Configuration resolved"
    );

    Ok(config)
}

/// Overlay command-line values onto a loaded configuration
pub fn apply_cli_overrides(config: &mut TomlConfig, cli: &CliOverrides) {
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(mode) = cli.default_mode {
        config.server.default_mode = mode;
    }
    if let Some(prefix) = cli.project_prefix.as_deref().filter(|p| is_valid_key(p)) {
        config.tracker.project_prefix = prefix.trim().to_string();
    }
}

/// Validate a credential or identifier (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Problems that degrade lookups without preventing startup
///
/// Lookups against an unconfigured tracker fail and fall back to empty
/// issue metadata, so none of these are fatal.
pub fn tracker_warnings(tracker: &TrackerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if tracker.normalized_base_url().is_none() {
        warnings.push(
            "Issue tracker URL not configured; reports will carry empty issue metadata. \
             Configure using one of:\n\
             1. Environment: JIRA_URL=https://your-domain.atlassian.net\n\
             2. TOML config: ~/.config/jrep/jrep-export.toml ([tracker] base_url = \"...\")"
                .to_string(),
        );
    }

    let has_user = tracker.user.as_deref().is_some_and(is_valid_key);
    let has_token = tracker.api_token.as_deref().is_some_and(is_valid_key);
    if has_user != has_token {
        warnings.push(
            "Issue tracker credentials incomplete: set both JIRA_USER and JIRA_API_TOKEN".to_string(),
        );
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_win() {
        let mut config = TomlConfig::default();
        apply_cli_overrides(
            &mut config,
            &CliOverrides {
                bind: Some("0.0.0.0:8080".to_string()),
                default_mode: Some(AggregationMode::AllIssues),
                project_prefix: Some(" OPS ".to_string()),
            },
        );
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.default_mode, AggregationMode::AllIssues);
        assert_eq!(config.tracker.project_prefix, "OPS");
    }

    #[test]
    fn test_blank_prefix_ignored() {
        let mut config = TomlConfig::default();
        apply_cli_overrides(
            &mut config,
            &CliOverrides {
                project_prefix: Some("  ".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(config.tracker.project_prefix, "ITSM");
    }

    #[test]
    fn test_tracker_warnings() {
        let mut tracker = TrackerConfig::default();
        assert_eq!(tracker_warnings(&tracker).len(), 1);

        tracker.base_url = Some("https://jira.example.com".to_string());
        assert!(tracker_warnings(&tracker).is_empty());

        tracker.user = Some("bot@example.com".to_string());
        assert_eq!(tracker_warnings(&tracker).len(), 1);

        tracker.api_token = Some("token".to_string());
        assert!(tracker_warnings(&tracker).is_empty());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}

//! Controller configuration.

/// Default label a workload carries to opt into automatic remediation.
pub const DEFAULT_AUTOMATION_LABEL: &str = "automation";

/// Default value of the automation label.
pub const DEFAULT_AUTOMATION_VALUE: &str = "true";

/// Knobs that are not part of any policy object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Label key a workload must carry to be remediated.
    pub automation_label: String,
    /// Required value of `automation_label`.
    pub automation_value: String,
    /// Registry hosts whose qualified form `<host>/<repository>` also matches.
    pub default_registries: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            automation_label: DEFAULT_AUTOMATION_LABEL.to_string(),
            automation_value: DEFAULT_AUTOMATION_VALUE.to_string(),
            default_registries: vec!["docker.io".to_string()],
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `WARDEN_AUTOMATION_LABEL` (default: `automation`)
    /// - `WARDEN_AUTOMATION_VALUE` (default: `true`)
    /// - `WARDEN_DEFAULT_REGISTRIES` (comma separated, default: `docker.io`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            automation_label: std::env::var("WARDEN_AUTOMATION_LABEL")
                .unwrap_or(defaults.automation_label),
            automation_value: std::env::var("WARDEN_AUTOMATION_VALUE")
                .unwrap_or(defaults.automation_value),
            default_registries: std::env::var("WARDEN_DEFAULT_REGISTRIES")
                .map(|raw| parse_registries(&raw))
                .unwrap_or(defaults.default_registries),
        }
    }
}

fn parse_registries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.automation_label, "automation");
        assert_eq!(cfg.automation_value, "true");
        assert_eq!(cfg.default_registries, vec!["docker.io"]);
    }

    #[test]
    fn registries_are_trimmed() {
        assert_eq!(
            parse_registries(" docker.io/, ghcr.io ,,"),
            vec!["docker.io", "ghcr.io"]
        );
    }
}

use crate::error::{Result, UpdaterError};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAKE: &str = "/usr/bin/make";
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 1800;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// A path pattern that triggers a fixed make target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Matcher {
    #[serde(
        alias = "pattern",
        serialize_with = "serialize_regex",
        deserialize_with = "deserialize_regex"
    )]
    pub regex: Regex,
    /// Make target to run when any changed path matches.
    #[serde(alias = "action")]
    pub target: String,
}

impl Matcher {
    pub fn new(pattern: &str, target: impl Into<String>) -> Result<Self> {
        Ok(Self {
            regex: compile(pattern)?,
            target: target.into(),
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| UpdaterError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn serialize_regex<S: Serializer>(regex: &Regex, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(regex.as_str())
}

fn deserialize_regex<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Regex, D::Error> {
    let pattern = String::deserialize(d)?;
    compile(&pattern).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// UpdateConfig
// ---------------------------------------------------------------------------

/// Static rules loaded once at startup and shared read-only between events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConfig {
    /// Repository-relative paths whose content picks `apply` or `applyTemplate`.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    #[serde(default = "default_make")]
    pub make: String,
    /// Per-task limit; 0 disables the timeout.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

fn default_make() -> String {
    DEFAULT_MAKE.to_string()
}

fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            matchers: Vec::new(),
            make: default_make(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

impl UpdateConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(UpdaterError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        // serde_yaml rejects a fully empty document; treat it as "no rules".
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        match self.task_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "empty path in targets".to_string(),
                });
                continue;
            }
            // Changed paths are repository-relative, so these never match.
            if Path::new(target).is_absolute() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "target '{target}' is absolute; use a repository-relative path"
                    ),
                });
            }
            if !seen.insert(target.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("target '{target}' is listed more than once"),
                });
            }
        }

        let mut seen = HashSet::new();
        for matcher in &self.matchers {
            if matcher.target.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("matcher '{}' has an empty target", matcher.regex),
                });
            } else if !seen.insert(matcher.target.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "make target '{}' is used by more than one matcher and may run twice",
                        matcher.target
                    ),
                });
            }
        }

        if self.make.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "make command is empty".to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_targets_and_matchers() {
        let cfg = UpdateConfig::from_yaml(
            r#"
targets:
  - manifests/app.yaml
matchers:
  - regex: '^jobs/.*\.yaml$'
    target: jobs
"#,
        )
        .unwrap();
        assert_eq!(cfg.targets, vec!["manifests/app.yaml"]);
        assert_eq!(cfg.matchers.len(), 1);
        assert!(cfg.matchers[0].regex.is_match("jobs/a.yaml"));
        assert_eq!(cfg.matchers[0].target, "jobs");
        assert_eq!(cfg.make, DEFAULT_MAKE);
        assert_eq!(cfg.task_timeout(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn matcher_aliases_accepted() {
        let cfg = UpdateConfig::from_yaml(
            r#"
matchers:
  - pattern: '^plugins/'
    action: plugins
"#,
        )
        .unwrap();
        assert_eq!(cfg.matchers[0].target, "plugins");
        assert!(cfg.matchers[0].regex.is_match("plugins/x.groovy"));
    }

    #[test]
    fn invalid_regex_rejected() {
        let err = UpdateConfig::from_yaml("matchers:\n  - regex: '(unclosed'\n    target: x\n")
            .unwrap_err();
        assert!(err.to_string().contains("(unclosed"), "got: {err}");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(UpdateConfig::from_yaml("targetz: []\n").is_err());
    }

    #[test]
    fn empty_document_is_empty_config() {
        let cfg = UpdateConfig::from_yaml("").unwrap();
        assert!(cfg.targets.is_empty());
        assert!(cfg.matchers.is_empty());
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let cfg = UpdateConfig::from_yaml("task_timeout_secs: 0\n").unwrap();
        assert_eq!(cfg.task_timeout(), None);
    }

    #[test]
    fn serialize_keeps_pattern_text() {
        let cfg = UpdateConfig {
            matchers: vec![Matcher::new(r"^jobs/.*\.yaml$", "jobs").unwrap()],
            ..UpdateConfig::default()
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed = UpdateConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.matchers[0].regex.as_str(), r"^jobs/.*\.yaml$");
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = UpdateConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, UpdaterError::ConfigNotFound(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "targets: [a.yaml]\n").unwrap();
        let cfg = UpdateConfig::load(&path).unwrap();
        assert_eq!(cfg.targets, vec!["a.yaml"]);
    }

    #[test]
    fn validate_clean_config_no_warnings() {
        let cfg = UpdateConfig {
            targets: vec!["a.yaml".into()],
            matchers: vec![Matcher::new("^jobs/", "jobs").unwrap()],
            ..UpdateConfig::default()
        };
        assert!(cfg.validate().is_empty());
        assert!(!cfg.has_errors());
    }

    #[test]
    fn validate_absolute_target_is_error() {
        let cfg = UpdateConfig {
            targets: vec!["/etc/app.yaml".into()],
            ..UpdateConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
        assert!(cfg.has_errors());
    }

    #[test]
    fn validate_duplicate_target_is_warning() {
        let cfg = UpdateConfig {
            targets: vec!["a.yaml".into(), "a.yaml".into()],
            ..UpdateConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(!cfg.has_errors());
    }

    #[test]
    fn validate_matcher_problems() {
        let cfg = UpdateConfig {
            matchers: vec![
                Matcher::new("^a/", "deploy").unwrap(),
                Matcher::new("^b/", "deploy").unwrap(),
                Matcher::new("^c/", " ").unwrap(),
            ],
            make: String::new(),
            ..UpdateConfig::default()
        };
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 2, "got: {warnings:?}");
        let warns_about_deploy = warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("deploy"));
        assert!(warns_about_deploy);
    }
}

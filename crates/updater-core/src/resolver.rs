//! Maps the changed paths of a merged pull request to make invocations.
//!
//! Two independent rule families:
//! - targets: exact path match, then the file's top-level `kind` picks
//!   `applyTemplate` (for `Template`) or `apply`;
//! - matchers: regex match on the path, at most one task per matcher.
//!
//! Target tasks always precede matcher tasks. Nothing is deduplicated across
//! the two families.

use crate::config::UpdateConfig;
use crate::error::ResolutionError;
use crate::github::ChangeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const TEMPLATE_KIND: &str = "Template";
const APPLY: &str = "apply";
const APPLY_TEMPLATE: &str = "applyTemplate";

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One command invocation: program followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Task(Vec<String>);

impl Task {
    pub fn new(argv: Vec<String>) -> Self {
        Self(argv)
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }

    pub fn program(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Kind lookup
// ---------------------------------------------------------------------------

/// Result of reading the untyped top-level `kind` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Absent,
    Named(String),
    WrongType,
}

/// Parse `content` as YAML (a superset of JSON) and look up `kind`.
///
/// Only the first document of a multi-document stream is read. An empty
/// document counts as an empty mapping.
pub fn read_kind(content: &[u8], path: &str) -> Result<Kind, ResolutionError> {
    let Some(document) = serde_yaml::Deserializer::from_slice(content).next() else {
        return Ok(Kind::Absent);
    };
    let value = serde_yaml::Value::deserialize(document).map_err(|e| ResolutionError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(Kind::Absent),
        _ => {
            return Err(ResolutionError::NotAMapping {
                path: path.to_string(),
            })
        }
    };
    Ok(match mapping.get("kind") {
        None => Kind::Absent,
        Some(serde_yaml::Value::String(s)) => Kind::Named(s.clone()),
        Some(_) => Kind::WrongType,
    })
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Target pass. Reads each matching file from `root`.
pub fn resolve_targets(
    config: &UpdateConfig,
    changes: &[ChangeRecord],
    root: &Path,
) -> (Vec<Task>, Vec<ResolutionError>) {
    let mut tasks = Vec::new();
    let mut errors = Vec::new();

    for target in &config.targets {
        for change in changes.iter().filter(|c| &c.filename == target) {
            let full = root.join(&change.filename).display().to_string();
            match task_for_target(&config.make, &full) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    tracing::warn!(path = %change.filename, error = %e, "cannot resolve target");
                    errors.push(e);
                }
            }
        }
    }

    (tasks, errors)
}

fn task_for_target(make: &str, full_path: &str) -> Result<Task, ResolutionError> {
    let content = std::fs::read(full_path).map_err(|e| ResolutionError::Read {
        path: full_path.to_string(),
        reason: e.to_string(),
    })?;
    let make_target = match read_kind(&content, full_path)? {
        Kind::Named(kind) if kind == TEMPLATE_KIND => APPLY_TEMPLATE,
        Kind::Named(_) | Kind::Absent => APPLY,
        Kind::WrongType => {
            return Err(ResolutionError::KindNotString {
                path: full_path.to_string(),
            })
        }
    };
    Ok(Task::new(vec![
        make.to_string(),
        make_target.to_string(),
        format!("WHAT={full_path}"),
    ]))
}

/// Matcher pass. Pure: never touches the filesystem.
pub fn resolve_matchers(config: &UpdateConfig, changes: &[ChangeRecord]) -> Vec<Task> {
    config
        .matchers
        .iter()
        .filter(|m| changes.iter().any(|c| m.regex.is_match(&c.filename)))
        .map(|m| Task::new(vec![config.make.clone(), m.target.clone()]))
        .collect()
}

/// Both passes, target tasks first.
pub fn resolve(
    config: &UpdateConfig,
    changes: &[ChangeRecord],
    root: &Path,
) -> (Vec<Task>, Vec<ResolutionError>) {
    let (mut tasks, errors) = resolve_targets(config, changes, root);
    tasks.extend(resolve_matchers(config, changes));
    (tasks, errors)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

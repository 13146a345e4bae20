use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("cannot decode pull_request payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid matcher regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("failed to clone {repo}: {reason}")]
    Clone { repo: String, reason: String },

    #[error("failed to check out {sha}: {reason}")]
    Checkout { sha: String, reason: String },

    #[error("failed to list changes for {org}/{repo}#{number}: {reason}")]
    ListChanges {
        org: String,
        repo: String,
        number: u64,
        reason: String,
    },

    #[error("failed to comment on {org}/{repo}#{number}: {reason}")]
    CreateComment {
        org: String,
        repo: String,
        number: u64,
        reason: String,
    },

    #[error("github returned {status}: {body}")]
    GithubStatus { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

/// A tracked file that could not be turned into a task.
///
/// These never abort an event; they are collected next to the task outcomes
/// and rendered in the "internal errors" section of the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("cannot read object YAML/JSON from {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("cannot parse object YAML/JSON from {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("object in {path} is not a mapping")]
    NotAMapping { path: String },

    #[error("cannot access object kind from {path}: kind is not a string")]
    KindNotString { path: String },
}

impl ResolutionError {
    pub fn path(&self) -> &str {
        match self {
            ResolutionError::Read { path, .. }
            | ResolutionError::Parse { path, .. }
            | ResolutionError::NotAMapping { path }
            | ResolutionError::KindNotString { path } => path,
        }
    }
}

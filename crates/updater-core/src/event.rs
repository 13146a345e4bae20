//! Decoding and filtering of inbound pull request notifications.

use crate::error::{Result, UpdaterError};
use serde::Deserialize;

pub const PULL_REQUEST_EVENT: &str = "pull_request";
const ACTION_CLOSED: &str = "closed";

// ---------------------------------------------------------------------------
// Wire types (only the fields the pipeline reads)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    pub head: GitRef,
    pub base: BaseRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseRef {
    pub repo: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Everything later stages need from an accepted merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPullRequest {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub head_sha: String,
    pub merge_sha: String,
    pub author: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    Accepted(MergedPullRequest),
    Ignored(String),
}

/// Decide whether a notification is a merged pull request worth acting on.
///
/// Only undecodable `pull_request` payloads are errors; everything else that
/// does not qualify is `Ignored` with a short reason.
pub fn intake(event_type: &str, payload: &[u8]) -> Result<Intake> {
    if event_type != PULL_REQUEST_EVENT {
        return Ok(Intake::Ignored(format!(
            "event type '{event_type}' is not handled"
        )));
    }

    let event: PullRequestEvent = serde_json::from_slice(payload).map_err(UpdaterError::Decode)?;

    if event.action != ACTION_CLOSED {
        return Ok(Intake::Ignored(format!("action '{}'", event.action)));
    }
    let pr = event.pull_request;
    if !pr.merged {
        return Ok(Intake::Ignored("closed without merging".to_string()));
    }
    let Some(merge_sha) = pr.merge_commit_sha.filter(|s| !s.is_empty()) else {
        return Ok(Intake::Ignored("merged without a merge commit".to_string()));
    };

    Ok(Intake::Accepted(MergedPullRequest {
        org: pr.base.repo.owner.login,
        repo: pr.base.repo.name,
        number: pr.number,
        head_sha: pr.head.sha,
        merge_sha,
        author: pr.user.login,
        body: pr.body.unwrap_or_default(),
        url: pr.html_url,
    }))
}

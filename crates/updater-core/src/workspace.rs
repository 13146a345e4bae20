//! Ephemeral checkouts of the repository a pull request was merged into.
//!
//! [`Workspace::acquire`] clones and checks out; the returned guard cleans
//! the checkout exactly once, either through [`Workspace::release`] or on
//! drop, so every exit path (including unwinding) removes it.

use crate::error::{Result, UpdaterError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const DEFAULT_GIT_BASE_URL: &str = "https://github.com";

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

pub trait SourceControl: Send + Sync {
    /// Clone `org/repo` into a fresh directory no other clone shares.
    fn clone_repo(&self, org_slash_repo: &str) -> Result<Box<dyn Repo>>;
}

pub trait Repo: Send {
    fn dir(&self) -> &Path;
    fn checkout(&mut self, sha: &str) -> Result<()>;
    /// Remove the checkout. Must tolerate being called more than once.
    fn clean(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Workspace guard
// ---------------------------------------------------------------------------

pub struct Workspace {
    repo: Box<dyn Repo>,
    released: bool,
}

impl Workspace {
    pub fn acquire(scm: &dyn SourceControl, org: &str, repo: &str, sha: &str) -> Result<Self> {
        let started = std::time::Instant::now();
        tracing::info!(repo = %format!("{org}/{repo}"), "cloning");
        let mut ws = Self {
            repo: scm.clone_repo(&format!("{org}/{repo}"))?,
            released: false,
        };
        tracing::info!(sha, "checking out");
        // On error `ws` drops here and cleans the partial clone.
        ws.repo.checkout(sha)?;
        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "cloned and checked out target commit"
        );
        Ok(ws)
    }

    pub fn dir(&self) -> &Path {
        self.repo.dir()
    }

    pub fn release(mut self) {
        self.clean_once();
    }

    fn clean_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.repo.clean() {
            tracing::error!(
                error = %e,
                dir = %self.repo.dir().display(),
                "error cleaning up repo"
            );
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.clean_once();
    }
}

// ---------------------------------------------------------------------------
// git CLI implementation
// ---------------------------------------------------------------------------

pub struct GitClient {
    base_url: String,
    token: Option<String>,
}

impl GitClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn remote_url(&self, org_slash_repo: &str) -> String {
        match (&self.token, self.base_url.split_once("://")) {
            (Some(token), Some((scheme, host))) => {
                format!("{scheme}://x-access-token:{token}@{host}/{org_slash_repo}.git")
            }
            _ => format!("{}/{org_slash_repo}.git", self.base_url),
        }
    }
}

impl SourceControl for GitClient {
    fn clone_repo(&self, org_slash_repo: &str) -> Result<Box<dyn Repo>> {
        let clone_err = |reason: String| UpdaterError::Clone {
            repo: org_slash_repo.to_string(),
            reason,
        };
        let tmp = tempfile::Builder::new()
            .prefix("config-updater-")
            .tempdir()
            .map_err(|e| clone_err(e.to_string()))?;
        let dir = tmp.path().join("repo");

        let output = Command::new("git")
            .args(["clone", "--quiet", &self.remote_url(org_slash_repo)])
            .arg(&dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| clone_err(e.to_string()))?;
        if !output.status.success() {
            // `tmp` drops with this error and removes the partial clone.
            return Err(clone_err(redact(
                String::from_utf8_lossy(&output.stderr).trim(),
                self.token.as_deref(),
            )));
        }

        Ok(Box::new(GitRepo {
            tmp: Some(tmp),
            dir,
        }))
    }
}

fn redact(text: &str, token: Option<&str>) -> String {
    match token {
        Some(t) if !t.is_empty() => text.replace(t, "<redacted>"),
        _ => text.to_string(),
    }
}

pub struct GitRepo {
    tmp: Option<TempDir>,
    dir: PathBuf,
}

impl Repo for GitRepo {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn checkout(&mut self, sha: &str) -> Result<()> {
        let output = Command::new("git")
            .args(["checkout", "--quiet", sha])
            .current_dir(&self.dir)
            .output()
            .map_err(|e| UpdaterError::Checkout {
                sha: sha.to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(UpdaterError::Checkout {
                sha: sha.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        match self.tmp.take() {
            Some(tmp) => Ok(tmp.close()?),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

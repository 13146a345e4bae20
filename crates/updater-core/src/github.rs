//! Pull request client: list changed files and post result comments.

use crate::error::{Result, UpdaterError};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

const ABOUT_THIS_BOT: &str = "I run the make targets configured for the files changed \
in this pull request. If you have questions or suggestions related to my behavior, \
please contact the maintainers of this repository.";

/// One changed file as reported for a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeRecord {
    pub filename: String,
}

impl ChangeRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

/// The subset of the issue tracker the pipeline talks to.
pub trait ChangeRequestClient: Send + Sync {
    fn get_changes(&self, org: &str, repo: &str, number: u64) -> Result<Vec<ChangeRecord>>;
    fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GithubClient
// ---------------------------------------------------------------------------

pub struct GithubClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        user_agent: &str,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{path}", self.endpoint))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(UpdaterError::GithubStatus {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        })
    }

    fn list_files(&self, org: &str, repo: &str, number: u64) -> Result<Vec<ChangeRecord>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let path = format!(
                "/repos/{org}/{repo}/pulls/{number}/files?per_page={PER_PAGE}&page={page}"
            );
            let resp = Self::check(self.request(reqwest::Method::GET, &path).send()?)?;
            let batch: Vec<ChangeRecord> = resp.json()?;
            let done = batch.len() < PER_PAGE;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page += 1;
        }
    }
}

impl ChangeRequestClient for GithubClient {
    fn get_changes(&self, org: &str, repo: &str, number: u64) -> Result<Vec<ChangeRecord>> {
        self.list_files(org, repo, number)
            .map_err(|e| UpdaterError::ListChanges {
                org: org.to_string(),
                repo: repo.to_string(),
                number,
                reason: e.to_string(),
            })
    }

    fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        let path = format!("/repos/{org}/{repo}/issues/{number}/comments");
        self.request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .map_err(UpdaterError::from)
            .and_then(Self::check)
            .map(|_| ())
            .map_err(|e| UpdaterError::CreateComment {
                org: org.to_string(),
                repo: repo.to_string(),
                number,
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Response template
// ---------------------------------------------------------------------------

/// Wrap `reply` in the standard bot response, quoting the pull request body.
pub fn format_response_raw(body: &str, url: &str, login: &str, reply: &str) -> String {
    let quoted = body
        .split('\n')
        .map(|line| format!(">{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let reason = format!("In response to [this]({url}):\n\n{quoted}\n");
    format!("@{login}: {reply}\n\n<details>\n\n{reason}\n\n{ABOUT_THIS_BOT}\n</details>")
}
